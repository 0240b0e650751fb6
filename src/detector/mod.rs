pub mod classifier;
pub mod state;
pub mod threshold;

pub use classifier::{classify, Engagement, CONFIDENCE_FLOOR};
pub use state::{DetectorConfig, DisengagementDetector, SkipReason, TickOutcome, TickReport};
pub use threshold::{normalize_threshold, ThresholdCache, DEFAULT_THRESHOLD_SECS};
