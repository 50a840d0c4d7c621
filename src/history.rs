//! Where finished sessions go, and the summaries computed over them.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};

use crate::models::SessionRecord;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(&self, record: &SessionRecord) -> Result<()>;

    /// Every stored record, oldest first.
    async fn load_all(&self) -> Result<Vec<SessionRecord>>;

    async fn today(&self) -> Result<Vec<SessionRecord>> {
        let records = self.load_all().await?;
        Ok(started_since(records, start_of_day(Local::now())))
    }

    async fn this_week(&self) -> Result<Vec<SessionRecord>> {
        let records = self.load_all().await?;
        Ok(started_since(records, week_cutoff(Utc::now())))
    }
}

pub fn started_since(records: Vec<SessionRecord>, cutoff: DateTime<Utc>) -> Vec<SessionRecord> {
    records
        .into_iter()
        .filter(|record| record.started_at >= cutoff)
        .collect()
}

/// Local midnight of `now`'s day, as UTC.
pub fn start_of_day<Tz: TimeZone>(now: DateTime<Tz>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
    now.timezone()
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}

pub fn week_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - chrono::Duration::days(7)
}

/// Sum of actual durations; records without an end time count for nothing.
pub fn total_focus_time(records: &[SessionRecord]) -> Duration {
    records.iter().filter_map(SessionRecord::actual_duration).sum()
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
