use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::info;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use super::apps::run_launcher;
use super::{ApplicationDirectory, MusicPlayer};
use crate::models::MusicSource;

/// Time a freshly launched player gets before it is asked to play.
pub const LAUNCH_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Process names a player shows up under in the process table.
fn process_names(source: MusicSource) -> &'static [&'static str] {
    match source {
        MusicSource::AppleMusic => &["Music"],
        MusicSource::Spotify => &["Spotify", "spotify"],
        MusicSource::Other => &[],
    }
}

/// `Other` has no dedicated player yet and falls back to Apple Music.
fn launch_target(source: MusicSource) -> MusicSource {
    match source {
        MusicSource::Other => MusicSource::AppleMusic,
        known => known,
    }
}

pub struct SystemMusicPlayer {
    apps: Arc<dyn ApplicationDirectory>,
    launch_delay: Duration,
    system: Mutex<System>,
}

impl SystemMusicPlayer {
    pub fn new(apps: Arc<dyn ApplicationDirectory>) -> Self {
        Self {
            apps,
            launch_delay: LAUNCH_SETTLE_DELAY,
            system: Mutex::new(System::new()),
        }
    }

    pub fn with_launch_delay(mut self, launch_delay: Duration) -> Self {
        self.launch_delay = launch_delay;
        self
    }

    fn send_transport(&self, source: MusicSource, verb: &str) -> Result<()> {
        if cfg!(target_os = "macos") {
            let bundle_id = source
                .bundle_id()
                .ok_or_else(|| anyhow!("no player registered for {}", source.as_str()))?;
            run_launcher(
                "osascript",
                &["-e", &format!("tell application id \"{bundle_id}\" to {verb}")],
            )?;
        } else {
            run_launcher("playerctl", &[verb])?;
        }
        Ok(())
    }
}

impl MusicPlayer for SystemMusicPlayer {
    fn start(&self, source: MusicSource) -> Result<()> {
        let target = launch_target(source);
        let bundle_id = target
            .bundle_id()
            .ok_or_else(|| anyhow!("no player registered for {}", target.as_str()))?;

        if !self.is_running(target) {
            self.apps.open(bundle_id)?;
        }

        thread::sleep(self.launch_delay);
        self.send_transport(target, "play")?;
        info!("Started music via {}", bundle_id);
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        for source in [MusicSource::AppleMusic, MusicSource::Spotify] {
            if self.is_running(source) {
                self.send_transport(source, "pause")?;
            }
        }
        Ok(())
    }

    fn is_running(&self, source: MusicSource) -> bool {
        let names = process_names(source);
        if names.is_empty() {
            return false;
        }

        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::new());

        system.processes().values().any(|process| {
            let name = process.name().to_string_lossy();
            names.iter().any(|candidate| name == *candidate)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstalledApp;

    struct NoApps;

    impl ApplicationDirectory for NoApps {
        fn list_applications(&self) -> Result<Vec<InstalledApp>> {
            Ok(Vec::new())
        }
        fn open(&self, bundle_id: &str) -> Result<()> {
            Err(anyhow!("{bundle_id} is not installed"))
        }
        fn activate(&self, bundle_id: &str) -> Result<()> {
            self.open(bundle_id)
        }
    }

    #[test]
    fn other_source_is_never_running() {
        let player = SystemMusicPlayer::new(Arc::new(NoApps));
        assert!(!player.is_running(MusicSource::Other));
    }

    #[test]
    fn other_source_launches_apple_music() {
        assert_eq!(launch_target(MusicSource::Other), MusicSource::AppleMusic);
        assert_eq!(launch_target(MusicSource::Spotify), MusicSource::Spotify);
    }

    #[test]
    fn spotify_matches_both_process_spellings() {
        assert_eq!(process_names(MusicSource::Spotify), ["Spotify", "spotify"]);
        assert!(process_names(MusicSource::Other).is_empty());
    }
}
