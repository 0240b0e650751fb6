use std::sync::Arc;

use log::info;
use tokio::sync::watch;

/// Seconds of sustained disengagement used when the remote record is missing.
pub const DEFAULT_THRESHOLD_SECS: u32 = 5;

/// Maps the remote `time` field onto a valid threshold. Missing, zero and
/// negative values fall back to the default.
pub fn normalize_threshold(raw: Option<i64>) -> u32 {
    match raw {
        Some(value) if value > 0 => u32::try_from(value).unwrap_or(u32::MAX),
        _ => DEFAULT_THRESHOLD_SECS,
    }
}

/// Locally cached disengagement threshold.
///
/// Written only by the configuration sync (initial read and row-update
/// pushes); read by the detector on every tick.
#[derive(Clone)]
pub struct ThresholdCache {
    sender: Arc<watch::Sender<u32>>,
}

impl Default for ThresholdCache {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_SECS)
    }
}

impl ThresholdCache {
    pub fn new(initial: u32) -> Self {
        let (sender, _) = watch::channel(initial.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn current(&self) -> u32 {
        *self.sender.borrow()
    }

    /// Applies a pushed remote value. Returns the value now in effect.
    pub fn apply_remote(&self, raw: Option<i64>) -> u32 {
        let next = normalize_threshold(raw);
        let changed = self.sender.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            info!("Disengagement threshold now {next}s");
        }
        next
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.sender.subscribe()
    }
}
