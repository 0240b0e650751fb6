use chrono::Utc;
use log::{debug, warn};

use crate::db::{Database, EngagementSample};
use crate::emotion::{RankedEmotion, TRACKED_EMOTIONS};

/// Highest-ranked emotion that the expression graph tracks.
pub fn pick_sample(ranked: &[RankedEmotion]) -> Option<&RankedEmotion> {
    ranked
        .iter()
        .find(|entry| TRACKED_EMOTIONS.contains(&entry.emotion.as_str()))
}

/// Fire-and-forget write; failures are logged and dropped.
pub fn record_sample(db: &Database, session_id: &str, ranked: &[RankedEmotion]) {
    let Some(pick) = pick_sample(ranked) else {
        return;
    };

    let sample = EngagementSample::new(session_id, Utc::now(), pick.emotion.clone(), pick.score);
    let db = db.clone();
    tokio::spawn(async move {
        match db.insert_sample(&sample).await {
            Ok(id) => debug!("Recorded sample {id}: {} {:.2}", sample.emotion, sample.score),
            Err(err) => warn!("Failed to record engagement sample: {err:#}"),
        }
    });
}
