//! The one-shot batch of start actions fired when a session begins.
//!
//! Actions run in a fixed order on their own task. Each one is isolated: a
//! failure is logged and published as a warning, and the next action still
//! runs. Nothing here touches the session state.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::sync::broadcast;

use super::TimerEvent;
use crate::models::SessionConfiguration;
use crate::services::Collaborators;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StartAction {
    ClearDesktop,
    OpenApp,
    StartMusic,
    StarterTask,
}

impl StartAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartAction::ClearDesktop => "clear-desktop",
            StartAction::OpenApp => "open-app",
            StartAction::StartMusic => "start-music",
            StartAction::StarterTask => "starter-task",
        }
    }
}

/// The actions `config` asks for, in the order they run.
pub fn planned_actions(config: &SessionConfiguration) -> Vec<StartAction> {
    let mut actions = Vec::with_capacity(4);
    if config.clear_desktop {
        actions.push(StartAction::ClearDesktop);
    }
    if config.app_to_open.is_some() {
        actions.push(StartAction::OpenApp);
    }
    if config.start_music {
        actions.push(StartAction::StartMusic);
    }
    if config.show_starter_task {
        actions.push(StartAction::StarterTask);
    }
    actions
}

/// What a batch of start actions produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct StartReport {
    pub desktop_folder: Option<String>,
    pub starter_task: Option<String>,
    pub failures: Vec<(StartAction, String)>,
}

/// Fires the start actions without waiting for them.
pub fn dispatch(
    config: SessionConfiguration,
    collaborators: Collaborators,
    events: broadcast::Sender<TimerEvent>,
) {
    tokio::spawn(async move {
        run_start_actions(config, collaborators, events).await;
    });
}

pub(crate) async fn run_start_actions(
    config: SessionConfiguration,
    collaborators: Collaborators,
    events: broadcast::Sender<TimerEvent>,
) -> StartReport {
    let mut report = StartReport::default();

    for action in planned_actions(&config) {
        match perform(action, &config, &collaborators).await {
            Ok(Outcome::Done) => log_info!("start action {} finished", action.as_str()),
            Ok(Outcome::DesktopCleared(folder)) => {
                log_info!("desktop cleared into {}", folder);
                let _ = events.send(TimerEvent::DesktopCleared {
                    folder: folder.clone(),
                });
                report.desktop_folder = Some(folder);
            }
            Ok(Outcome::StarterTask(Some(task))) => {
                log_info!("starter task: {}", task);
                let _ = events.send(TimerEvent::StarterTask { task: task.clone() });
                report.starter_task = Some(task);
            }
            Ok(Outcome::StarterTask(None)) => log_info!("starter task prompt dismissed"),
            Err(err) => {
                log_error!("start action {} failed: {err:#}", action.as_str());
                let _ = events.send(TimerEvent::Warning {
                    source: action.as_str().to_string(),
                    message: format!("{err:#}"),
                });
                report.failures.push((action, format!("{err:#}")));
            }
        }
    }

    if !report.failures.is_empty() {
        log_warn!(
            "{} of the start actions failed; the session keeps running",
            report.failures.len()
        );
    }
    report
}

enum Outcome {
    Done,
    DesktopCleared(String),
    StarterTask(Option<String>),
}

async fn perform(
    action: StartAction,
    config: &SessionConfiguration,
    collaborators: &Collaborators,
) -> Result<Outcome> {
    match action {
        StartAction::ClearDesktop => {
            let desktop = Arc::clone(&collaborators.desktop);
            blocking(move || desktop.clear().map(Outcome::DesktopCleared)).await
        }
        StartAction::OpenApp => {
            let apps = Arc::clone(&collaborators.apps);
            let bundle_id = config
                .app_to_open
                .clone()
                .ok_or_else(|| anyhow!("no application configured"))?;
            blocking(move || apps.open(&bundle_id).map(|_| Outcome::Done)).await
        }
        StartAction::StartMusic => {
            let music = Arc::clone(&collaborators.music);
            let source = config.music_source;
            blocking(move || music.start(source).map(|_| Outcome::Done)).await
        }
        StartAction::StarterTask => {
            let prompt = Arc::clone(&collaborators.prompt);
            let text = config.starter_task_prompt.clone();
            blocking(move || Ok(Outcome::StarterTask(prompt.ask_starter_task(&text)))).await
        }
    }
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| anyhow!("start action worker panicked: {err}"))?
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{InstalledApp, MusicSource};
    use crate::services::{
        ApplicationDirectory, CompletionChoice, DesktopOrganizer, MusicPlayer, PromptSurface,
    };
    use anyhow::bail;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Collaborator double that records every call into one shared journal.
    #[derive(Default)]
    pub(crate) struct Journal {
        pub calls: Mutex<Vec<String>>,
        pub fail_desktop: bool,
        pub fail_apps: bool,
        pub starter_answer: Option<String>,
        pub completion_choice: Option<CompletionChoice>,
    }

    impl Journal {
        pub fn failing_desktop() -> Self {
            Self {
                fail_desktop: true,
                ..Self::default()
            }
        }

        fn note(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    pub(crate) fn collaborators(journal: &Arc<Journal>) -> Collaborators {
        Collaborators {
            apps: journal.clone(),
            desktop: journal.clone(),
            music: journal.clone(),
            prompt: journal.clone(),
        }
    }

    impl ApplicationDirectory for Journal {
        fn list_applications(&self) -> Result<Vec<InstalledApp>> {
            Ok(Vec::new())
        }
        fn open(&self, bundle_id: &str) -> Result<()> {
            self.note(format!("open {bundle_id}"));
            if self.fail_apps {
                bail!("{bundle_id} not found");
            }
            Ok(())
        }
        fn activate(&self, bundle_id: &str) -> Result<()> {
            self.open(bundle_id)
        }
    }

    impl DesktopOrganizer for Journal {
        fn clear(&self) -> Result<String> {
            self.note("clear desktop".into());
            if self.fail_desktop {
                bail!("desktop is not reachable");
            }
            Ok(".Desktop_Cleared_test".into())
        }
        fn restore(&self, folder: &str) -> Result<()> {
            self.note(format!("restore {folder}"));
            Ok(())
        }
        fn list_items(&self) -> Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }
    }

    impl MusicPlayer for Journal {
        fn start(&self, source: MusicSource) -> Result<()> {
            self.note(format!("music {}", source.as_str()));
            Ok(())
        }
        fn pause(&self) -> Result<()> {
            self.note("music pause".into());
            Ok(())
        }
        fn is_running(&self, _source: MusicSource) -> bool {
            false
        }
    }

    impl PromptSurface for Journal {
        fn ask_starter_task(&self, prompt: &str) -> Option<String> {
            self.note(format!("ask {prompt}"));
            self.starter_answer.clone()
        }
        fn notify_completion(&self) -> CompletionChoice {
            self.note("notify completion".into());
            self.completion_choice.unwrap_or(CompletionChoice::Close)
        }
    }

    fn everything() -> SessionConfiguration {
        SessionConfiguration {
            duration_secs: 60,
            clear_desktop: true,
            app_to_open: Some("com.example.editor".into()),
            start_music: true,
            music_source: MusicSource::Spotify,
            show_starter_task: true,
            starter_task_prompt: "First step?".into(),
        }
    }

    #[test]
    fn plans_only_requested_actions() {
        assert!(planned_actions(&SessionConfiguration::countdown(60)).is_empty());
        let config = SessionConfiguration {
            start_music: true,
            ..SessionConfiguration::countdown(60)
        };
        assert_eq!(planned_actions(&config), vec![StartAction::StartMusic]);
    }

    #[tokio::test]
    async fn runs_actions_in_fixed_order() {
        let journal = Arc::new(Journal {
            starter_answer: Some("write the outline".into()),
            ..Journal::default()
        });
        let (events, mut rx) = broadcast::channel(16);

        let report = run_start_actions(everything(), collaborators(&journal), events).await;

        assert_eq!(
            journal.calls(),
            [
                "clear desktop",
                "open com.example.editor",
                "music spotify",
                "ask First step?",
            ]
        );
        assert_eq!(report.desktop_folder.as_deref(), Some(".Desktop_Cleared_test"));
        assert_eq!(report.starter_task.as_deref(), Some("write the outline"));
        assert!(report.failures.is_empty());

        assert_eq!(
            rx.recv().await.unwrap(),
            TimerEvent::DesktopCleared {
                folder: ".Desktop_Cleared_test".into()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            TimerEvent::StarterTask {
                task: "write the outline".into()
            }
        );
    }

    #[tokio::test]
    async fn failures_do_not_stop_later_actions() {
        let journal = Arc::new(Journal {
            fail_desktop: true,
            fail_apps: true,
            ..Journal::default()
        });
        let (events, mut rx) = broadcast::channel(16);

        let report = run_start_actions(everything(), collaborators(&journal), events).await;

        assert_eq!(journal.calls().len(), 4);
        let failed: Vec<_> = report.failures.iter().map(|(action, _)| *action).collect();
        assert_eq!(failed, [StartAction::ClearDesktop, StartAction::OpenApp]);

        match rx.recv().await.unwrap() {
            TimerEvent::Warning { source, message } => {
                assert_eq!(source, "clear-desktop");
                assert!(message.contains("not reachable"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
