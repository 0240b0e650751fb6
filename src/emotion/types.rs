use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Emotions that mark a learner as drifting away from the material.
pub const DISENGAGED_EMOTIONS: [&str; 2] = ["Boredom", "Disappointment"];

/// Emotions recorded into the engagement graph, in display order.
pub const TRACKED_EMOTIONS: [&str; 9] = [
    "Disappointment",
    "Boredom",
    "Confusion",
    "Doubt",
    "Neutral",
    "Calmness",
    "Concentration",
    "Interest",
    "Joy",
];

/// Provider model channels. Only `Face` is ever requested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DetectionChannel {
    #[default]
    Face,
    Burst,
    Prosody,
}

impl DetectionChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionChannel::Face => "face",
            DetectionChannel::Burst => "burst",
            DetectionChannel::Prosody => "prosody",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionScore {
    pub name: String,
    pub score: f64,
}

/// One ranked entry handed to the detector and the UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedEmotion {
    pub emotion: String,
    pub score: f64,
}

impl RankedEmotion {
    pub fn new(emotion: impl Into<String>, score: f64) -> Self {
        Self {
            emotion: emotion.into(),
            score,
        }
    }
}

/// Scores from the most recent provider frame. Replaced wholesale; never merged.
#[derive(Debug, Clone, Default)]
pub struct EmotionSnapshot {
    scores: HashMap<String, f64>,
    frame_seq: u64,
}

impl EmotionSnapshot {
    pub fn from_scores(scores: &[EmotionScore], frame_seq: u64) -> Self {
        let scores = scores
            .iter()
            .map(|entry| (entry.name.clone(), entry.score))
            .collect();
        Self { scores, frame_seq }
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn score(&self, name: &str) -> Option<f64> {
        self.scores.get(name).copied()
    }

    /// Sequence number of the frame this snapshot was built from.
    pub fn frame_seq(&self) -> u64 {
        self.frame_seq
    }

    /// Entries by descending score. Ties land in arbitrary order.
    pub fn ranked(&self) -> Vec<RankedEmotion> {
        let mut ranked: Vec<RankedEmotion> = self
            .scores
            .iter()
            .map(|(name, score)| RankedEmotion::new(name.clone(), *score))
            .collect();
        ranked.sort_unstable_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}
