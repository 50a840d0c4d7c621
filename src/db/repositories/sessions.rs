use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{format_datetime, parse_datetime, parse_optional_datetime, to_i64, to_u64},
    Database,
};
use crate::history::HistoryStore;
use crate::models::SessionRecord;

const SELECT_SESSIONS: &str =
    "SELECT id, started_at, ended_at, planned_duration_secs FROM sessions";

fn row_to_record(row: &Row) -> Result<SessionRecord> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let planned: i64 = row.get("planned_duration_secs")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        planned_duration_secs: to_u64(planned, "planned_duration_secs")?,
    })
}

impl Database {
    pub async fn insert_session(&self, record: &SessionRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, started_at, ended_at, planned_duration_secs)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id,
                    format_datetime(&record.started_at),
                    record.ended_at.as_ref().map(format_datetime),
                    to_i64(record.planned_duration_secs)?,
                ],
            )
            .with_context(|| format!("failed to insert session {}", record.id))?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_SESSIONS} WHERE id = ?1"))?;
            let record = stmt
                .query_row(params![session_id], |row| Ok(row_to_record(row)))
                .optional()?
                .transpose()?;
            Ok(record)
        })
        .await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_SESSIONS} ORDER BY started_at ASC"))?;
            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    /// Returns whether a session with that id existed.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }
}

#[async_trait]
impl HistoryStore for Database {
    async fn save(&self, record: &SessionRecord) -> Result<()> {
        self.insert_session(record).await
    }

    async fn load_all(&self) -> Result<Vec<SessionRecord>> {
        self.list_sessions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::total_focus_time;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tempfile::tempdir;

    fn record(offset_mins: i64, secs: Option<i64>) -> SessionRecord {
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
            + chrono::Duration::minutes(offset_mins)
            + chrono::Duration::nanoseconds(123_456_789);
        let record = SessionRecord::begin(start, 1500);
        match secs {
            Some(secs) => record.finish(start + chrono::Duration::milliseconds(secs * 1000 + 7)),
            None => record,
        }
    }

    #[tokio::test]
    async fn records_round_trip_every_field() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("history/attention.sqlite3")).unwrap();

        let finished = record(0, Some(1500));
        let open = record(30, None);
        db.save(&finished).await.unwrap();
        db.save(&open).await.unwrap();

        assert_eq!(db.get_session(&finished.id).await.unwrap(), Some(finished.clone()));
        assert_eq!(db.load_all().await.unwrap(), vec![finished, open]);
    }

    #[tokio::test]
    async fn history_survives_reopening() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("attention.sqlite3");
        let saved = record(0, Some(60));
        {
            let db = Database::new(path.clone()).unwrap();
            db.save(&saved).await.unwrap();
        }
        let db = Database::new(path).unwrap();
        assert_eq!(db.load_all().await.unwrap(), vec![saved]);
    }

    #[tokio::test]
    async fn lists_oldest_first_and_totals_finished_only() {
        let db = Database::in_memory().unwrap();
        for r in [record(60, Some(300)), record(0, Some(600)), record(120, None)] {
            db.save(&r).await.unwrap();
        }

        let all = db.load_all().await.unwrap();
        assert!(all.windows(2).all(|w| w[0].started_at <= w[1].started_at));
        assert_eq!(total_focus_time(&all), Duration::from_millis(900_014));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let db = Database::in_memory().unwrap();
        let r = record(0, Some(60));
        db.save(&r).await.unwrap();
        assert!(db.save(&r).await.is_err());
        assert_eq!(db.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let db = Database::in_memory().unwrap();
        let r = record(0, Some(60));
        db.save(&r).await.unwrap();

        assert!(db.delete_session(&r.id).await.unwrap());
        assert!(!db.delete_session(&r.id).await.unwrap());
        assert_eq!(db.get_session(&r.id).await.unwrap(), None);
    }
}
