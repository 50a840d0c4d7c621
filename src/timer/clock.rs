use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of wall-clock timestamps for session records.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall time anchored once and advanced by tokio's monotonic clock.
///
/// Follows `tokio::time::pause`/`advance`, so records stamped under a paused
/// test runtime line up with the ticks that drove them.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    wall_anchor: DateTime<Utc>,
    anchor: Instant,
}

impl AnchoredClock {
    pub fn new(wall_anchor: DateTime<Utc>) -> Self {
        Self {
            wall_anchor,
            anchor: Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.anchor.elapsed()).unwrap_or_default();
        self.wall_anchor + elapsed
    }
}
