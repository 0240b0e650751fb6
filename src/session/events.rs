use serde::Serialize;
use tokio::sync::mpsc;

use crate::detector::{TickOutcome, TickReport};
use crate::emotion::RankedEmotion;
use crate::intervention::InterventionView;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ProviderStatus {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngagementTickEvent {
    pub outcome: TickOutcome,
    pub counter: u32,
    pub threshold: u32,
    pub triggered: bool,
    pub emotions: Vec<RankedEmotion>,
}

impl EngagementTickEvent {
    pub fn new(report: TickReport, emotions: Vec<RankedEmotion>) -> Self {
        Self {
            outcome: report.outcome,
            counter: report.counter,
            threshold: report.threshold,
            triggered: report.triggered,
            emotions,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatusEvent {
    pub status: ProviderStatus,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MessageEvent {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ThresholdEvent {
    pub threshold: u32,
}

/// Everything pushed to the UI. Serializes as the bare payload; the
/// channel name comes from [`EngagementEvent::name`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum EngagementEvent {
    Tick(EngagementTickEvent),
    InterventionChanged(InterventionView),
    ProviderStatus(ProviderStatusEvent),
    ProviderWarning(MessageEvent),
    CaptureUnavailable(MessageEvent),
    ThresholdChanged(ThresholdEvent),
}

impl EngagementEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngagementEvent::Tick(_) => "engagement-tick",
            EngagementEvent::InterventionChanged(_) => "intervention-changed",
            EngagementEvent::ProviderStatus(_) => "provider-status",
            EngagementEvent::ProviderWarning(_) => "provider-warning",
            EngagementEvent::CaptureUnavailable(_) => "capture-unavailable",
            EngagementEvent::ThresholdChanged(_) => "threshold-changed",
        }
    }

    pub fn provider_status(status: ProviderStatus, detail: Option<String>) -> Self {
        EngagementEvent::ProviderStatus(ProviderStatusEvent { status, detail })
    }

    pub fn provider_warning(message: impl Into<String>) -> Self {
        EngagementEvent::ProviderWarning(MessageEvent {
            message: message.into(),
        })
    }

    pub fn capture_unavailable(message: impl Into<String>) -> Self {
        EngagementEvent::CaptureUnavailable(MessageEvent {
            message: message.into(),
        })
    }
}

/// Where the runtime publishes events. Emission never fails the caller.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngagementEvent);
}

/// Forwards events into an unbounded channel; used headless and in tests.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<EngagementEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngagementEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: EngagementEvent) {
        // Receiver gone means nobody is listening anymore.
        let _ = self.sender.send(event);
    }
}

#[cfg(feature = "desktop")]
pub use desktop::TauriSink;

#[cfg(feature = "desktop")]
mod desktop {
    use log::warn;
    use tauri::{AppHandle, Emitter};

    use super::{EngagementEvent, EventSink};

    pub struct TauriSink {
        app_handle: AppHandle,
    }

    impl TauriSink {
        pub fn new(app_handle: AppHandle) -> Self {
            Self { app_handle }
        }
    }

    impl EventSink for TauriSink {
        fn emit(&self, event: EngagementEvent) {
            if let Err(err) = self.app_handle.emit(event.name(), &event) {
                warn!("Failed to emit {}: {err}", event.name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervention::InterventionSession;
    use serde_json::json;

    #[test]
    fn events_serialize_as_bare_payloads() {
        let event = EngagementEvent::provider_warning("No faces detected.");
        assert_eq!(event.name(), "provider-warning");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "message": "No faces detected." })
        );

        let status = EngagementEvent::provider_status(ProviderStatus::Connected, None);
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({ "status": "Connected", "detail": null })
        );
    }

    #[test]
    fn intervention_view_keeps_its_shape() {
        let view = InterventionSession::new().view();
        let event = EngagementEvent::InterventionChanged(view.clone());
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::to_value(&view).unwrap()
        );
    }

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(EngagementEvent::capture_unavailable("denied"));
        sink.emit(EngagementEvent::ThresholdChanged(ThresholdEvent { threshold: 3 }));

        assert_eq!(rx.recv().await.unwrap().name(), "capture-unavailable");
        assert_eq!(rx.recv().await.unwrap().name(), "threshold-changed");
    }

    #[test]
    fn channel_sink_ignores_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(EngagementEvent::provider_warning("late"));
    }
}
