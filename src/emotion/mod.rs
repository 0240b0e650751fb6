pub mod frame;
pub mod ingestor;
pub mod types;

pub use frame::{FrameSubmission, ProviderFrame};
pub use ingestor::{EmotionIngestor, FrameOutcome};
pub use types::{
    DetectionChannel, EmotionScore, EmotionSnapshot, RankedEmotion, DISENGAGED_EMOTIONS,
    TRACKED_EMOTIONS,
};
