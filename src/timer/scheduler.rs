use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic tick source for one session.
///
/// Every `start_ticking` opens a new generation. The tick callback receives
/// the generation it was spawned under so the owner can drop ticks that
/// were already in flight when it stopped or restarted the scheduler.
pub struct Scheduler {
    interval: Duration,
    generation: u64,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            generation: 0,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ticking(&self) -> bool {
        self.cancel_token.is_some()
    }

    /// True when a tick stamped with `generation` may still be applied.
    pub fn accepts(&self, generation: u64) -> bool {
        self.is_ticking() && self.generation == generation
    }

    /// Starts emitting ticks, restarting the interval if already running.
    pub fn start_ticking<F, Fut>(&mut self, mut on_tick: F) -> u64
    where
        F: FnMut(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop_ticking();

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let period = self.interval;

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => on_tick(generation).await,
                }
            }
            debug!("ticker generation {generation} stopped");
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        generation
    }

    /// Stops the ticker. Idempotent.
    ///
    /// A callback that is mid-flight is allowed to finish; it observes
    /// `accepts(generation) == false` and must discard its tick.
    pub fn stop_ticking(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        // Detach rather than abort: the running callback may be the one
        // stopping us and still has work to finish.
        self.handle.take();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop_ticking();
    }
}
