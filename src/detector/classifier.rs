use serde::Serialize;

use crate::emotion::{RankedEmotion, DISENGAGED_EMOTIONS};

/// Readings below this score are not trusted for classification.
pub const CONFIDENCE_FLOOR: f64 = 0.40;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Engagement {
    Engaged,
    Disengaged,
}

/// Walks the ranked list top-down. The first sub-floor entry ends the walk as
/// engaged; a confident `Boredom`/`Disappointment` reading before that means
/// disengaged.
pub fn classify(ranked: &[RankedEmotion]) -> Engagement {
    for entry in ranked {
        if entry.score < CONFIDENCE_FLOOR {
            return Engagement::Engaged;
        }
        if DISENGAGED_EMOTIONS.contains(&entry.emotion.as_str()) {
            return Engagement::Disengaged;
        }
    }
    Engagement::Engaged
}
