use serde::Serialize;

use crate::emotion::RankedEmotion;

use super::classifier::{classify, Engagement};

#[derive(Debug, Clone, Copy, Default)]
pub struct DetectorConfig {
    /// Count a disengaged reading at most once per provider frame.
    pub require_fresh_frame: bool,
}

/// Why a tick did not classify.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    InterventionOpen,
    NoData,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TickOutcome {
    Skipped { reason: SkipReason },
    Classified { engagement: Engagement, counted: bool },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub counter: u32,
    pub threshold: u32,
    /// The counter reached the threshold on this tick.
    pub triggered: bool,
}

/// Accumulates seconds of continuous disengagement.
///
/// Empty and engaged ticks pause the counter rather than resetting it; only
/// intervention boundaries reset it (see [`DisengagementDetector::reset`]).
#[derive(Debug, Default)]
pub struct DisengagementDetector {
    config: DetectorConfig,
    counter: u32,
    last_counted_seq: Option<u64>,
}

impl DisengagementDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// One sampling tick. `threshold` is whatever is in effect right now.
    ///
    /// A trigger only happens on a tick that advanced the counter, and fires
    /// once the counter is at or past the threshold. With a fixed threshold
    /// that is exactly the tick where they become equal; a lowered threshold
    /// fires on the next counted tick rather than retroactively.
    pub fn tick(
        &mut self,
        ranked: &[RankedEmotion],
        frame_seq: Option<u64>,
        intervention_open: bool,
        threshold: u32,
    ) -> TickReport {
        let threshold = threshold.max(1);
        let report = |outcome, counter, triggered| TickReport {
            outcome,
            counter,
            threshold,
            triggered,
        };

        if intervention_open {
            let outcome = TickOutcome::Skipped {
                reason: SkipReason::InterventionOpen,
            };
            return report(outcome, self.counter, false);
        }

        if ranked.is_empty() {
            let outcome = TickOutcome::Skipped {
                reason: SkipReason::NoData,
            };
            return report(outcome, self.counter, false);
        }

        let engagement = classify(ranked);
        let counted = engagement == Engagement::Disengaged && self.is_fresh(frame_seq);
        if counted {
            self.counter = self.counter.saturating_add(1);
            self.last_counted_seq = frame_seq;
        }

        let triggered = counted && self.counter >= threshold;
        let outcome = TickOutcome::Classified {
            engagement,
            counted,
        };
        report(outcome, self.counter, triggered)
    }

    fn is_fresh(&self, frame_seq: Option<u64>) -> bool {
        if !self.config.require_fresh_frame {
            return true;
        }
        match (frame_seq, self.last_counted_seq) {
            (Some(current), Some(last)) => current != last,
            _ => true,
        }
    }
}
