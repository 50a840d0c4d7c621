use serde::{Deserialize, Serialize};

pub const DEFAULT_STARTER_TASK_PROMPT: &str = "What's the first small task you'll do?";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MusicSource {
    #[default]
    AppleMusic,
    Spotify,
    Other,
}

impl MusicSource {
    /// Bundle identifier of the player backing this source, if there is a known one.
    pub fn bundle_id(&self) -> Option<&'static str> {
        match self {
            MusicSource::AppleMusic => Some("com.apple.Music"),
            MusicSource::Spotify => Some("com.spotify.client"),
            MusicSource::Other => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MusicSource::AppleMusic => "apple-music",
            MusicSource::Spotify => "spotify",
            MusicSource::Other => "other",
        }
    }
}

/// Everything a single focus session needs to know, frozen at `start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfiguration {
    pub duration_secs: u64,
    pub clear_desktop: bool,
    pub app_to_open: Option<String>,
    pub start_music: bool,
    pub music_source: MusicSource,
    pub show_starter_task: bool,
    pub starter_task_prompt: String,
}

impl SessionConfiguration {
    /// A bare countdown with every start action switched off.
    pub fn countdown(duration_secs: u64) -> Self {
        Self {
            duration_secs,
            clear_desktop: false,
            app_to_open: None,
            start_music: false,
            music_source: MusicSource::default(),
            show_starter_task: false,
            starter_task_prompt: DEFAULT_STARTER_TASK_PROMPT.to_string(),
        }
    }

    pub fn has_start_actions(&self) -> bool {
        self.clear_desktop
            || self.app_to_open.is_some()
            || self.start_music
            || self.show_starter_task
    }
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        Self {
            duration_secs: 25 * 60,
            clear_desktop: true,
            app_to_open: None,
            start_music: false,
            music_source: MusicSource::AppleMusic,
            show_starter_task: true,
            starter_task_prompt: DEFAULT_STARTER_TASK_PROMPT.to_string(),
        }
    }
}
