use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// One engagement telemetry point for the expression graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngagementSample {
    pub id: Option<i64>,
    pub session_id: String,
    pub recorded_at: DateTime<Utc>,
    /// Wall-clock label shown on the graph axis.
    pub date: String,
    pub emotion: String,
    pub score: f64,
}

impl EngagementSample {
    pub fn new(
        session_id: impl Into<String>,
        recorded_at: DateTime<Utc>,
        emotion: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            id: None,
            session_id: session_id.into(),
            date: recorded_at.with_timezone(&Local).format("%H:%M:%S").to_string(),
            recorded_at,
            emotion: emotion.into(),
            score,
        }
    }
}

/// A row written on the database thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    pub table: String,
    pub row_id: i64,
}
