use std::{fmt::Display, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use crate::emotion::FrameSubmission;
use crate::session::{EngagementController, EngagementEvent, ProviderStatus};
use crate::{log_error, log_info, log_warn};

use super::capture::{encode_frame, CaptureError, FrameSource};

const ENABLE_LOGS: bool = true;

/// Frames are submitted once per second.
pub const FRAME_INTERVAL: Duration = Duration::from_secs(1);

/// Appends the API key as the `api_key` query parameter.
pub fn socket_url(endpoint: &str, api_key: Option<&str>) -> String {
    match api_key {
        Some(key) if !key.is_empty() => {
            let separator = if endpoint.contains('?') { '&' } else { '?' };
            format!("{endpoint}{separator}api_key={key}")
        }
        _ => endpoint.to_string(),
    }
}

struct ActiveConnection {
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    sender: JoinHandle<()>,
}

/// The streaming link to the emotion provider. At most one connection is
/// live; reconnecting is always an explicit `connect` call.
#[derive(Clone)]
pub struct ProviderLink {
    active: Arc<Mutex<Option<ActiveConnection>>>,
    frame_interval: Duration,
}

impl Default for ProviderLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderLink {
    pub fn new() -> Self {
        Self {
            active: Arc::new(Mutex::new(None)),
            frame_interval: FRAME_INTERVAL,
        }
    }

    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    pub async fn is_connected(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|connection| !connection.cancel.is_cancelled())
    }

    pub async fn connect(
        &self,
        endpoint: &str,
        api_key: Option<&str>,
        controller: EngagementController,
        source: Box<dyn FrameSource>,
    ) -> Result<()> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            shutdown(previous).await;
        }

        let events = controller.events();
        events.emit(EngagementEvent::provider_status(ProviderStatus::Connecting, None));
        log_info!("Connecting to emotion provider at {endpoint}");

        let stream = match connect_async(socket_url(endpoint, api_key)).await {
            Ok((stream, _response)) => stream,
            Err(err) => {
                log_warn!("Emotion provider connection failed: {err}");
                events.emit(EngagementEvent::provider_status(
                    ProviderStatus::Disconnected,
                    Some(err.to_string()),
                ));
                return Err(err).context("failed to connect to emotion provider");
            }
        };

        events.emit(EngagementEvent::provider_status(ProviderStatus::Connected, None));
        log_info!("Emotion provider connected");

        let (write, read) = stream.split();
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_loop(read, controller.clone(), cancel.clone()));
        let sender = tokio::spawn(send_loop(
            write,
            source,
            controller,
            cancel.clone(),
            self.frame_interval,
        ));

        *active = Some(ActiveConnection {
            cancel,
            reader,
            sender,
        });
        Ok(())
    }

    /// Returns `false` when nothing was connected.
    pub async fn disconnect(&self) -> bool {
        match self.active.lock().await.take() {
            Some(connection) => {
                shutdown(connection).await;
                true
            }
            None => false,
        }
    }
}

async fn shutdown(connection: ActiveConnection) {
    connection.cancel.cancel();
    if let Err(err) = connection.sender.await {
        log_error!("Frame sender task failed to join: {err}");
    }
    if let Err(err) = connection.reader.await {
        log_error!("Provider reader task failed to join: {err}");
    }
}

async fn read_loop<R, E>(mut read: R, controller: EngagementController, cancel: CancellationToken)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => break None,
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    controller.on_frame(&text).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|frame| frame.reason.to_string()).filter(|r| !r.is_empty());
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => break Some(err.to_string()),
                None => break None,
            },
        }
    };

    cancel.cancel();
    controller.set_capture_active(false).await;
    log_info!(
        "Emotion provider disconnected{}",
        reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
    );
    controller.events().emit(EngagementEvent::provider_status(
        ProviderStatus::Disconnected,
        reason,
    ));
}

async fn send_loop<W>(
    mut write: W,
    mut source: Box<dyn FrameSource>,
    controller: EngagementController,
    cancel: CancellationToken,
    frame_interval: Duration,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let mut ticker = time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let grabbed = tokio::task::spawn_blocking(move || {
            let encoded = source.grab().and_then(|frame| encode_frame(&frame));
            (source, encoded)
        })
        .await;

        let encoded = match grabbed {
            Ok((returned, encoded)) => {
                source = returned;
                encoded
            }
            Err(err) => {
                log_error!("Frame capture worker failed: {err}");
                controller.capture_unavailable(&err.to_string()).await;
                cancel.cancelled().await;
                break;
            }
        };

        let data = match encoded {
            Ok(data) => data,
            Err(err) if err.is_device_error() => {
                // Socket stays open; capture resumes only on reconnect.
                controller.capture_unavailable(&err.to_string()).await;
                cancel.cancelled().await;
                break;
            }
            Err(CaptureError::NoFrame) => continue,
            Err(err) => {
                log_warn!("Skipping frame: {err}");
                continue;
            }
        };

        let payload = match serde_json::to_string(&FrameSubmission::face(data)) {
            Ok(payload) => payload,
            Err(err) => {
                log_error!("Failed to serialize frame submission: {err}");
                continue;
            }
        };

        controller.set_capture_active(true).await;
        if let Err(err) = write.send(Message::Text(payload)).await {
            log_warn!("Failed to send frame to emotion provider: {err}");
            cancel.cancel();
            break;
        }
    }

    let _ = write.close().await;
}
