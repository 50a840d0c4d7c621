use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SessionState;
use crate::models::SessionRecord;
use crate::services::CompletionChoice;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: SessionState,
    pub remaining_secs: u64,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Everything the controller reports to whoever is watching.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TimerEvent {
    StateChanged(TimerSnapshot),
    /// Countdown reached zero and the record was handed to history.
    SessionCompleted { record: SessionRecord },
    /// The user ended the session early and the record was handed to history.
    SessionEnded { record: SessionRecord },
    /// The completion prompt was answered or gave up; `StartBreak` has
    /// already returned the controller to idle.
    CompletionAnswered { choice: CompletionChoice },
    DesktopCleared { folder: String },
    StarterTask { task: String },
    Warning { source: String, message: String },
}
