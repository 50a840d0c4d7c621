use std::sync::{Arc, Weak};

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::{broadcast, Mutex};

use crate::history::HistoryStore;
use crate::models::{SessionConfiguration, SessionRecord};
use crate::services::{Collaborators, CompletionChoice};

use super::clock::{Clock, SystemClock};
use super::orchestration;
use super::scheduler::{Scheduler, TICK_INTERVAL};
use super::state::{self, Command, Effect, SessionState};
use super::{TimerEvent, TimerSnapshot};

const EVENT_CAPACITY: usize = 128;

struct ActiveSession {
    config: SessionConfiguration,
    record: SessionRecord,
}

#[derive(Default)]
struct ControllerState {
    state: SessionState,
    session: Option<ActiveSession>,
    /// Exists from `start` until the session's terminal transition.
    scheduler: Option<Scheduler>,
}

impl ControllerState {
    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            state: self.state,
            remaining_secs: self.state.remaining_secs(),
            session_id: self.session.as_ref().map(|s| s.record.id.clone()),
            started_at: self.session.as_ref().map(|s| s.record.started_at),
        }
    }
}

struct Shared {
    state: Mutex<ControllerState>,
    collaborators: Collaborators,
    history: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<TimerEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Completed,
    Ended,
}

/// Work left over once a transition is committed and the lock released.
struct Aftermath {
    snapshot: TimerSnapshot,
    start_actions: Option<SessionConfiguration>,
    finished: Option<(SessionRecord, Termination)>,
    notify_completion: bool,
}

/// Owns one focus session at a time.
///
/// Every transition, whether from a command or a tick, runs while holding
/// the state lock, so transitions are strictly serialized. Clones share the
/// same session.
#[derive(Clone)]
pub struct TimerController {
    shared: Arc<Shared>,
}

impl TimerController {
    pub fn new(collaborators: Collaborators, history: Arc<dyn HistoryStore>) -> Self {
        Self::with_clock(collaborators, history, Arc::new(SystemClock))
    }

    pub fn with_clock(
        collaborators: Collaborators,
        history: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState::default()),
                collaborators,
                history,
                clock,
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.shared.events.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.shared.state.lock().await.state
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.shared.state.lock().await.snapshot()
    }

    /// Begins a session. Rejected while another one is running or paused.
    pub async fn start(&self, config: SessionConfiguration) -> Result<TimerSnapshot> {
        self.command(Command::Start(config)).await
    }

    pub async fn pause(&self) -> Result<TimerSnapshot> {
        self.command(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<TimerSnapshot> {
        self.command(Command::Resume).await
    }

    pub async fn toggle_pause(&self) -> Result<TimerSnapshot> {
        self.command(Command::TogglePause).await
    }

    /// Ends the active session early. Returns the record handed to history,
    /// or `None` when there was nothing to end.
    pub async fn end(&self) -> Result<Option<SessionRecord>> {
        let aftermath = self.apply(Command::End, None).await?;
        let record = aftermath
            .as_ref()
            .and_then(|a| a.finished.as_ref())
            .map(|(record, _)| record.clone());
        if let Some(aftermath) = aftermath {
            self.settle(aftermath).await;
        }
        Ok(record)
    }

    /// Acknowledges a completed session and returns to idle.
    pub async fn dismiss(&self) -> Result<TimerSnapshot> {
        self.command(Command::Dismiss).await
    }

    async fn command(&self, command: Command) -> Result<TimerSnapshot> {
        match self.apply(command, None).await? {
            Some(aftermath) => {
                let snapshot = aftermath.snapshot.clone();
                self.settle(aftermath).await;
                Ok(snapshot)
            }
            None => Ok(self.snapshot().await),
        }
    }

    async fn on_tick(&self, generation: u64) {
        match self.apply(Command::Tick, Some(generation)).await {
            Ok(Some(aftermath)) => self.settle(aftermath).await,
            Ok(None) => {}
            Err(err) => error!("tick rejected: {err:#}"),
        }
    }

    /// Commits one transition under the lock.
    ///
    /// Returns `None` for a tick from a scheduler generation that has since
    /// been stopped or replaced.
    async fn apply(&self, command: Command, tick: Option<u64>) -> Result<Option<Aftermath>> {
        let mut guard = self.shared.state.lock().await;
        let inner = &mut *guard;

        if let Some(generation) = tick {
            let live = inner
                .scheduler
                .as_ref()
                .is_some_and(|scheduler| scheduler.accepts(generation));
            if !live {
                debug!("dropping stale tick from generation {generation}");
                return Ok(None);
            }
        }

        let previous = inner.state;
        let transition = state::transition(previous, &command).map_err(|err| {
            warn!("{command:?} rejected in {previous:?}: {err}");
            err
        })?;

        let mut aftermath = Aftermath {
            snapshot: inner.snapshot(),
            start_actions: None,
            finished: None,
            notify_completion: false,
        };

        for effect in &transition.effects {
            match effect {
                Effect::ClearSession => {
                    inner.session = None;
                    inner.scheduler = None;
                }
                Effect::BeginRecord => {
                    if let Command::Start(config) = &command {
                        let record =
                            SessionRecord::begin(self.shared.clock.now(), config.duration_secs);
                        info!(
                            "Starting focus session {} for {}s",
                            record.id, config.duration_secs
                        );
                        inner.session = Some(ActiveSession {
                            config: config.clone(),
                            record,
                        });
                    }
                }
                Effect::RunStartActions => {
                    aftermath.start_actions = inner
                        .session
                        .as_ref()
                        .map(|session| session.config.clone())
                        .filter(SessionConfiguration::has_start_actions);
                }
                Effect::StartTicking => self.start_ticking(inner),
                Effect::StopTicking => {
                    if let Some(scheduler) = inner.scheduler.as_mut() {
                        scheduler.stop_ticking();
                    }
                }
                Effect::FinalizeRecord => {
                    inner.scheduler = None;
                    if let Some(session) = inner.session.take() {
                        let termination = if transition.next == SessionState::Completed {
                            Termination::Completed
                        } else {
                            Termination::Ended
                        };
                        let record = session.record.finish(self.shared.clock.now());
                        aftermath.finished = Some((record, termination));
                    }
                }
                Effect::NotifyCompletion => aftermath.notify_completion = true,
            }
        }

        inner.state = transition.next;
        aftermath.snapshot = inner.snapshot();

        if transition.next != previous || !transition.effects.is_empty() {
            debug!("{previous:?} -> {:?}", transition.next);
            let _ = self
                .shared
                .events
                .send(TimerEvent::StateChanged(aftermath.snapshot.clone()));
        }

        Ok(Some(aftermath))
    }

    fn start_ticking(&self, inner: &mut ControllerState) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let scheduler = inner
            .scheduler
            .get_or_insert_with(|| Scheduler::new(TICK_INTERVAL));

        scheduler.start_ticking(move |generation| {
            let weak = weak.clone();
            async move {
                if let Some(shared) = weak.upgrade() {
                    TimerController { shared }.on_tick(generation).await;
                }
            }
        });
    }

    /// Runs the side effects of a committed transition outside the lock.
    async fn settle(&self, aftermath: Aftermath) {
        if let Some(config) = aftermath.start_actions {
            orchestration::dispatch(
                config,
                self.shared.collaborators.clone(),
                self.shared.events.clone(),
            );
        }

        if let Some((record, termination)) = aftermath.finished {
            self.hand_off(&record).await;
            let event = match termination {
                Termination::Completed => {
                    info!("Focus session {} completed", record.id);
                    TimerEvent::SessionCompleted { record }
                }
                Termination::Ended => {
                    info!("Focus session {} ended early", record.id);
                    TimerEvent::SessionEnded { record }
                }
            };
            let _ = self.shared.events.send(event);
        }

        if aftermath.notify_completion {
            self.notify_completion();
        }
    }

    async fn hand_off(&self, record: &SessionRecord) {
        if let Err(err) = self.shared.history.save(record).await {
            error!("Failed to save session {} to history: {err:#}", record.id);
            let _ = self.shared.events.send(TimerEvent::Warning {
                source: "history".to_string(),
                message: format!("session {} was not saved: {err:#}", record.id),
            });
        }
    }

    fn notify_completion(&self) {
        let controller = self.clone();
        let prompt = Arc::clone(&self.shared.collaborators.prompt);
        tokio::spawn(async move {
            let answer = tokio::task::spawn_blocking(move || prompt.notify_completion()).await;
            let choice = answer.unwrap_or_else(|err| {
                error!("completion prompt failed: {err}");
                CompletionChoice::Close
            });
            debug!("completion choice: {choice:?}");
            if choice == CompletionChoice::StartBreak {
                if let Err(err) = controller.dismiss().await {
                    warn!("could not dismiss completed session: {err:#}");
                }
            }
            let _ = controller
                .shared
                .events
                .send(TimerEvent::CompletionAnswered { choice });
        });
    }
}
