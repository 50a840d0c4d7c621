use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use crate::models::configuration::DEFAULT_STARTER_TASK_PROMPT;
use crate::models::{MusicSource, SessionConfiguration};

pub const DATA_DIR_ENV: &str = "ATTENTION_DATA_DIR";
const APP_DIR_NAME: &str = "Attention";

/// Where the database and settings file live.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| anyhow!("no data directory for this user; set {DATA_DIR_ENV}"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
    pub duration_minutes: u64,
    pub clear_desktop: bool,
    pub app_to_open: Option<String>,
    pub start_music: bool,
    pub music_source: MusicSource,
    pub show_starter_task: bool,
    pub starter_task_prompt: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            duration_minutes: 25,
            clear_desktop: true,
            app_to_open: None,
            start_music: false,
            music_source: MusicSource::AppleMusic,
            show_starter_task: true,
            starter_task_prompt: DEFAULT_STARTER_TASK_PROMPT.into(),
        }
    }
}

impl UserSettings {
    /// Freezes these settings into the configuration for one session.
    pub fn to_configuration(&self) -> SessionConfiguration {
        SessionConfiguration {
            duration_secs: self.duration_minutes.saturating_mul(60),
            clear_desktop: self.clear_desktop,
            app_to_open: self.app_to_open.clone().filter(|id| !id.trim().is_empty()),
            start_music: self.start_music,
            music_source: self.music_source,
            show_starter_task: self.show_starter_task,
            starter_task_prompt: self.starter_task_prompt.clone(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> UserSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: UserSettings) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
