use std::sync::Arc;

use log::{info, warn};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::db::{repositories::CONFIG_TABLE, Database};
use crate::detector::{normalize_threshold, ThresholdCache};

use super::events::{EngagementEvent, EventSink, ThresholdEvent};

/// Startup read of the configuration record. Storage failures fall back to
/// the default threshold.
pub async fn load_threshold_cache(db: &Database) -> ThresholdCache {
    match db.load_threshold().await {
        Ok(raw) => ThresholdCache::new(normalize_threshold(raw)),
        Err(err) => {
            warn!("Failed to read engagement config, using default threshold: {err:#}");
            ThresholdCache::default()
        }
    }
}

/// Re-reads the configuration record whenever its row changes and pushes the
/// result into `cache`. Runs until `cancel` fires or the database closes.
pub fn spawn_threshold_sync(
    db: Database,
    cache: ThresholdCache,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut changes = db.subscribe_changes();

    tokio::spawn(async move {
        loop {
            let relevant = tokio::select! {
                _ = cancel.cancelled() => break,
                change = changes.recv() => match change {
                    Ok(change) => change.table == CONFIG_TABLE,
                    // Missed notifications may have included ours.
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Config sync lagged by {skipped} row changes; re-reading");
                        true
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            if !relevant {
                continue;
            }

            match db.load_threshold().await {
                Ok(raw) => {
                    let before = cache.current();
                    let now = cache.apply_remote(raw);
                    if now != before {
                        events.emit(EngagementEvent::ThresholdChanged(ThresholdEvent {
                            threshold: now,
                        }));
                    }
                }
                Err(err) => warn!("Failed to re-read engagement config: {err:#}"),
            }
        }

        info!("Threshold sync stopped");
    })
}
