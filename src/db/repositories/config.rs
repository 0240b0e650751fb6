use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::Database;

pub const CONFIG_TABLE: &str = "engagement_config";
const CONFIG_ROW_ID: i64 = 1;

impl Database {
    /// Raw `time` value of the configuration record, if the row exists.
    pub async fn load_threshold(&self) -> Result<Option<i64>> {
        self.execute(|conn| {
            let time = conn
                .query_row(
                    "SELECT time FROM engagement_config WHERE id = ?1",
                    params![CONFIG_ROW_ID],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .optional()
                .context("failed to read engagement config")?;
            Ok(time.flatten())
        })
        .await
    }

    pub async fn store_threshold(&self, seconds: u32) -> Result<()> {
        if seconds == 0 {
            bail!("threshold must be at least one second");
        }

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO engagement_config (id, time, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET time = excluded.time, updated_at = excluded.updated_at",
                params![CONFIG_ROW_ID, i64::from(seconds), Utc::now().to_rfc3339()],
            )
            .context("failed to store engagement threshold")?;
            Ok(())
        })
        .await
    }
}
