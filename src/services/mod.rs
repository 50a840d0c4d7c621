//! Narrow interfaces to the OS capabilities a focus session touches.
//!
//! Implementations are blocking; the controller always calls them from
//! `spawn_blocking` so they never hold up the countdown.

pub mod apps;
pub mod desktop;
pub mod music;
pub mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{InstalledApp, MusicSource};

pub use apps::SystemApplications;
pub use desktop::FsDesktopOrganizer;
pub use music::SystemMusicPlayer;
pub use prompt::ConsolePrompt;

pub trait ApplicationDirectory: Send + Sync {
    /// Installed applications, sorted by name, one entry per bundle id.
    fn list_applications(&self) -> Result<Vec<InstalledApp>>;
    fn open(&self, bundle_id: &str) -> Result<()>;
    /// Brings a running app to the foreground, launching it otherwise.
    fn activate(&self, bundle_id: &str) -> Result<()>;
}

pub trait DesktopOrganizer: Send + Sync {
    /// Hides every visible desktop item and returns the folder holding them.
    fn clear(&self) -> Result<String>;
    fn restore(&self, folder: &str) -> Result<()>;
    fn list_items(&self) -> Result<Vec<PathBuf>>;
}

pub trait MusicPlayer: Send + Sync {
    fn start(&self, source: MusicSource) -> Result<()>;
    fn pause(&self) -> Result<()>;
    fn is_running(&self, source: MusicSource) -> bool;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CompletionChoice {
    StartBreak,
    Close,
}

pub trait PromptSurface: Send + Sync {
    fn ask_starter_task(&self, prompt: &str) -> Option<String>;
    fn notify_completion(&self) -> CompletionChoice;
}

/// The set of collaborators a controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub apps: Arc<dyn ApplicationDirectory>,
    pub desktop: Arc<dyn DesktopOrganizer>,
    pub music: Arc<dyn MusicPlayer>,
    pub prompt: Arc<dyn PromptSurface>,
}
