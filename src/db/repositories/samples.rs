use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{helpers::parse_datetime, helpers::to_sql_error, Database, EngagementSample};

fn row_to_sample(row: &Row) -> Result<EngagementSample, rusqlite::Error> {
    let recorded_at: String = row.get("recorded_at")?;

    Ok(EngagementSample {
        id: Some(row.get("id")?),
        session_id: row.get("session_id")?,
        recorded_at: parse_datetime(&recorded_at, "recorded_at").map_err(to_sql_error)?,
        date: row.get("date")?,
        emotion: row.get("emotion")?,
        score: row.get("score")?,
    })
}

impl Database {
    pub async fn insert_sample(&self, sample: &EngagementSample) -> Result<i64> {
        let record = sample.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO engagement_samples (session_id, recorded_at, date, emotion, score)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.session_id,
                    record.recorded_at.to_rfc3339(),
                    record.date,
                    record.emotion,
                    record.score,
                ],
            )
            .context("failed to insert engagement sample")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Latest samples for a session, oldest first so they plot left to right.
    pub async fn recent_samples(&self, session_id: &str, limit: u32) -> Result<Vec<EngagementSample>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, recorded_at, date, emotion, score
                 FROM engagement_samples
                 WHERE session_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )?;

            let mut samples = stmt
                .query_map(params![session_id, i64::from(limit)], row_to_sample)?
                .collect::<Result<Vec<_>, _>>()?;
            samples.reverse();

            Ok(samples)
        })
        .await
    }
}
