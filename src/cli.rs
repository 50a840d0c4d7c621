use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::models::MusicSource;
use crate::settings::UserSettings;

/// focus timer that clears the deck before you start
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// run one focus session in this terminal (the default)
    Start(StartArgs),
    /// list recorded sessions and the total focus time
    History(HistoryArgs),
    /// list installed applications that can be opened at start
    Apps,
    /// move a cleared desktop folder's items back onto the desktop
    Restore {
        /// folder name printed when the desktop was cleared
        folder: String,
    },
    /// print the saved session settings
    Settings,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct StartArgs {
    /// session length in minutes
    #[clap(short = 'm', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub minutes: Option<u64>,

    /// hide desktop items for the session
    #[clap(long, conflicts_with = "keep_desktop")]
    pub clear_desktop: bool,

    /// leave the desktop as it is
    #[clap(long)]
    pub keep_desktop: bool,

    /// bundle identifier of an app to bring forward
    #[clap(short = 'a', long = "app")]
    pub app: Option<String>,

    /// start music from this player
    #[clap(long, value_enum)]
    pub music: Option<MusicChoice>,

    /// skip the "first small task" question
    #[clap(long)]
    pub no_starter_task: bool,

    /// remember these options for later sessions
    #[clap(long)]
    pub save: bool,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryArgs {
    /// only sessions started today
    #[clap(long, conflicts_with = "week")]
    pub today: bool,

    /// only sessions started in the last seven days
    #[clap(long)]
    pub week: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum MusicChoice {
    AppleMusic,
    Spotify,
    Other,
}

impl From<MusicChoice> for MusicSource {
    fn from(choice: MusicChoice) -> Self {
        match choice {
            MusicChoice::AppleMusic => MusicSource::AppleMusic,
            MusicChoice::Spotify => MusicSource::Spotify,
            MusicChoice::Other => MusicSource::Other,
        }
    }
}

impl StartArgs {
    /// Settings for this run: the saved ones with any flags laid on top.
    pub fn apply_to(&self, mut settings: UserSettings) -> UserSettings {
        if let Some(minutes) = self.minutes {
            settings.duration_minutes = minutes;
        }
        if self.clear_desktop {
            settings.clear_desktop = true;
        }
        if self.keep_desktop {
            settings.clear_desktop = false;
        }
        if let Some(app) = &self.app {
            settings.app_to_open = Some(app.clone());
        }
        if let Some(music) = self.music {
            settings.start_music = true;
            settings.music_source = music.into();
        }
        if self.no_starter_task {
            settings.show_starter_task = false;
        }
        settings
    }
}
