use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbImage;
use tokio::sync::watch;

use super::capture::{CaptureError, FrameSource};

#[derive(Debug, Clone)]
enum Delivery {
    Frame(RgbImage),
    Failed(String),
}

/// Latest camera frame handed over by the webview. Only the newest frame is
/// kept; older ones are overwritten.
#[derive(Debug, Clone)]
pub struct FrameInbox {
    tx: Arc<watch::Sender<Option<Delivery>>>,
}

impl Default for FrameInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameInbox {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Accepts base64 image data, with or without a `data:` URL prefix.
    pub fn submit_encoded(&self, data: &str) -> Result<(), CaptureError> {
        let frame = decode_submitted_frame(data)?;
        self.submit(frame);
        Ok(())
    }

    pub fn submit(&self, frame: RgbImage) {
        self.tx.send_replace(Some(Delivery::Frame(frame)));
    }

    /// The webview lost the camera (permission denied, device gone).
    pub fn fail(&self, reason: impl Into<String>) {
        self.tx.send_replace(Some(Delivery::Failed(reason.into())));
    }

    /// A source that only sees frames submitted after this call.
    pub fn source(&self) -> WebviewSource {
        WebviewSource {
            rx: self.tx.subscribe(),
        }
    }
}

/// Frame source fed by [`FrameInbox`].
#[derive(Debug)]
pub struct WebviewSource {
    rx: watch::Receiver<Option<Delivery>>,
}

impl FrameSource for WebviewSource {
    fn grab(&mut self) -> Result<RgbImage, CaptureError> {
        match self.rx.has_changed() {
            Ok(true) => {}
            Ok(false) => return Err(CaptureError::NoFrame),
            Err(_) => return Err(CaptureError::Unavailable("frame inbox closed".into())),
        }

        match self.rx.borrow_and_update().clone() {
            Some(Delivery::Frame(frame)) => Ok(frame),
            Some(Delivery::Failed(reason)) => Err(CaptureError::PermissionDenied(reason)),
            None => Err(CaptureError::NoFrame),
        }
    }
}

pub fn decode_submitted_frame(data: &str) -> Result<RgbImage, CaptureError> {
    let payload = match data.trim().split_once(',') {
        Some((header, body)) if header.starts_with("data:") => body,
        _ => data.trim(),
    };
    let bytes = STANDARD
        .decode(payload)
        .map_err(|err| CaptureError::Decode(format!("invalid base64: {err}")))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|err| CaptureError::Decode(err.to_string()))?;
    Ok(image.to_rgb8())
}
