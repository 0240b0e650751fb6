pub mod config_sync;
pub mod controller;
pub mod events;
pub mod telemetry;

#[cfg(feature = "desktop")]
pub mod commands;

pub use config_sync::{load_threshold_cache, spawn_threshold_sync};
pub use controller::EngagementController;
pub use events::{ChannelSink, EngagementEvent, EventSink, ProviderStatus};
