pub mod capture;
pub mod inbox;
pub mod socket;

use std::path::Path;

pub use capture::{encode_frame, CaptureError, DirectorySource, FrameSource, JPEG_QUALITY};
pub use inbox::{decode_submitted_frame, FrameInbox, WebviewSource};
pub use socket::{socket_url, ProviderLink, FRAME_INTERVAL};

/// Replays the capture directory when one is configured; otherwise frames
/// come from the webview camera through `inbox`.
pub fn open_frame_source(
    capture_dir: Option<&Path>,
    inbox: &FrameInbox,
) -> Result<Box<dyn FrameSource>, CaptureError> {
    match capture_dir {
        Some(dir) => Ok(Box::new(DirectorySource::open(dir)?)),
        None => Ok(Box::new(inbox.source())),
    }
}
