use log::warn;
use serde::Serialize;

use super::frame::{parse_provider_frame, ProviderFrame};
use super::types::{DetectionChannel, EmotionSnapshot, RankedEmotion};

/// Result of feeding one provider message to the ingestor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FrameOutcome {
    Updated { emotions: usize },
    Warning { message: String },
    ProviderError { message: String },
    Empty,
    Malformed,
    /// Scores that arrived while capture was off.
    Ignored,
}

/// Holds the latest emotion snapshot for the active channel.
#[derive(Debug, Default)]
pub struct EmotionIngestor {
    channel: DetectionChannel,
    snapshot: Option<EmotionSnapshot>,
    last_warning: Option<String>,
    capture_active: bool,
    frames_seen: u64,
}

impl EmotionIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self) -> DetectionChannel {
        self.channel
    }

    pub fn on_frame(&mut self, raw: &str) -> FrameOutcome {
        self.frames_seen = self.frames_seen.wrapping_add(1);

        match parse_provider_frame(raw, self.channel) {
            Ok(ProviderFrame::Scores(_)) if !self.capture_active => FrameOutcome::Ignored,
            Ok(ProviderFrame::Scores(scores)) => {
                let snapshot = EmotionSnapshot::from_scores(&scores, self.frames_seen);
                let emotions = snapshot.len();
                self.snapshot = Some(snapshot);
                self.last_warning = None;
                FrameOutcome::Updated { emotions }
            }
            Ok(ProviderFrame::Warning(message)) => {
                self.snapshot = None;
                self.last_warning = Some(message.clone());
                FrameOutcome::Warning { message }
            }
            Ok(ProviderFrame::Error(message)) => {
                self.snapshot = None;
                FrameOutcome::ProviderError { message }
            }
            Ok(ProviderFrame::Empty) => {
                self.snapshot = None;
                FrameOutcome::Empty
            }
            Err(err) => {
                warn!("Dropping malformed provider frame: {err}");
                self.snapshot = None;
                FrameOutcome::Malformed
            }
        }
    }

    /// Ranked view of the current snapshot. Empty whenever capture is off so
    /// nothing downstream classifies stale readings.
    pub fn ranked_snapshot(&self) -> Vec<RankedEmotion> {
        if !self.capture_active {
            return Vec::new();
        }
        self.snapshot
            .as_ref()
            .map(EmotionSnapshot::ranked)
            .unwrap_or_default()
    }

    /// Sequence number of the frame behind the current snapshot, if live.
    pub fn snapshot_seq(&self) -> Option<u64> {
        if !self.capture_active {
            return None;
        }
        self.snapshot.as_ref().map(EmotionSnapshot::frame_seq)
    }

    pub fn capture_active(&self) -> bool {
        self.capture_active
    }

    /// Any change of capture state drops the snapshot, so a reading from
    /// before capture started is never classified.
    pub fn set_capture_active(&mut self, active: bool) {
        if self.capture_active != active {
            self.snapshot = None;
        }
        self.capture_active = active;
    }

    pub fn last_warning(&self) -> Option<&str> {
        self.last_warning.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BORED: &str =
        r#"{"face": {"predictions": [{"emotions": [{"name": "Boredom", "score": 0.7}, {"name": "Joy", "score": 0.3}]}]}}"#;
    const JOYFUL: &str =
        r#"{"face": {"predictions": [{"emotions": [{"name": "Joy", "score": 0.9}]}]}}"#;

    fn live() -> EmotionIngestor {
        let mut ingestor = EmotionIngestor::new();
        ingestor.set_capture_active(true);
        ingestor
    }

    #[test]
    fn new_frame_replaces_previous_snapshot() {
        let mut ingestor = live();
        assert_eq!(ingestor.on_frame(BORED), FrameOutcome::Updated { emotions: 2 });
        assert_eq!(ingestor.on_frame(JOYFUL), FrameOutcome::Updated { emotions: 1 });

        let ranked = ingestor.ranked_snapshot();
        assert_eq!(ranked, vec![RankedEmotion::new("Joy", 0.9)]);
    }

    #[test]
    fn warning_clears_snapshot() {
        let mut ingestor = live();
        ingestor.on_frame(BORED);
        let outcome = ingestor.on_frame(r#"{"face": {"warning": "No faces detected."}}"#);

        assert!(matches!(outcome, FrameOutcome::Warning { .. }));
        assert!(ingestor.ranked_snapshot().is_empty());
        assert_eq!(ingestor.last_warning(), Some("No faces detected."));
    }

    #[test]
    fn malformed_frame_is_no_data() {
        let mut ingestor = live();
        ingestor.on_frame(BORED);
        assert_eq!(ingestor.on_frame("{{{"), FrameOutcome::Malformed);
        assert!(ingestor.ranked_snapshot().is_empty());
    }

    #[test]
    fn inactive_capture_hides_snapshot() {
        let mut ingestor = EmotionIngestor::new();
        ingestor.on_frame(BORED);
        assert!(ingestor.ranked_snapshot().is_empty());
        assert_eq!(ingestor.snapshot_seq(), None);

        ingestor.set_capture_active(true);
        ingestor.on_frame(BORED);
        assert_eq!(ingestor.ranked_snapshot().len(), 2);

        ingestor.set_capture_active(false);
        ingestor.set_capture_active(true);
        assert!(ingestor.ranked_snapshot().is_empty());
    }

    #[test]
    fn frame_before_capture_start_is_never_classified() {
        let mut ingestor = EmotionIngestor::new();
        assert_eq!(ingestor.on_frame(BORED), FrameOutcome::Ignored);

        ingestor.set_capture_active(true);
        assert!(ingestor.ranked_snapshot().is_empty());
        assert_eq!(ingestor.snapshot_seq(), None);

        ingestor.on_frame(JOYFUL);
        ingestor.set_capture_active(true);
        assert_eq!(ingestor.ranked_snapshot(), vec![RankedEmotion::new("Joy", 0.9)]);
    }

    #[test]
    fn snapshot_seq_advances_per_frame() {
        let mut ingestor = live();
        ingestor.on_frame(BORED);
        let first = ingestor.snapshot_seq().unwrap();
        ingestor.on_frame(BORED);
        assert_eq!(ingestor.snapshot_seq(), Some(first + 1));
    }
}
