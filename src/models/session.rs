//! The persisted fact describing one focus session's timing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub planned_duration_secs: u64,
}

impl SessionRecord {
    pub fn begin(started_at: DateTime<Utc>, planned_duration_secs: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at,
            ended_at: None,
            planned_duration_secs,
        }
    }

    /// Stamps the end time. Consumes the record so it can only be finished once.
    pub fn finish(mut self, ended_at: DateTime<Utc>) -> Self {
        self.ended_at = Some(ended_at);
        self
    }

    pub fn completed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// `ended_at - started_at`, or `None` while the session is still open.
    pub fn actual_duration(&self) -> Option<Duration> {
        self.ended_at
            .map(|end| (end - self.started_at).to_std().unwrap_or_default())
    }

    pub fn planned_duration(&self) -> Duration {
        Duration::from_secs(self.planned_duration_secs)
    }
}
