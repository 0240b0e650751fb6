use std::{
    fs,
    io::{self, Cursor},
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use thiserror::Error;

/// JPEG quality of submitted frames.
pub const JPEG_QUALITY: u8 = 80;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("camera unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode frame: {0}")]
    Encode(String),

    #[error("failed to decode submitted frame: {0}")]
    Decode(String),

    #[error("no new frame since the last grab")]
    NoFrame,
}

impl CaptureError {
    /// Device-level failures end the capture; anything else skips one frame.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            CaptureError::PermissionDenied(_) | CaptureError::Unavailable(_)
        )
    }
}

impl From<io::Error> for CaptureError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied(err.to_string()),
            _ => CaptureError::Unavailable(err.to_string()),
        }
    }
}

/// A camera, or anything that can stand in for one. Grabs are blocking and
/// are run off the async runtime.
pub trait FrameSource: Send + 'static {
    fn grab(&mut self) -> Result<RgbImage, CaptureError>;
}

/// JPEG at [`JPEG_QUALITY`], base64 encoded for the provider socket.
pub fn encode_frame(frame: &RgbImage) -> Result<String, CaptureError> {
    let mut jpeg = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(frame)
        .map_err(|err| CaptureError::Encode(err.to_string()))?;
    Ok(STANDARD.encode(jpeg.into_inner()))
}

/// Replays still images from a directory in name order, looping forever.
#[derive(Debug)]
pub struct DirectorySource {
    frames: Vec<PathBuf>,
    next: usize,
}

impl DirectorySource {
    pub fn open(dir: &Path) -> Result<Self, CaptureError> {
        let mut frames = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                frames.push(path);
            }
        }

        if frames.is_empty() {
            return Err(CaptureError::Unavailable(format!(
                "no images in {}",
                dir.display()
            )));
        }
        frames.sort();

        Ok(Self { frames, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for DirectorySource {
    fn grab(&mut self) -> Result<RgbImage, CaptureError> {
        let path = &self.frames[self.next % self.frames.len()];
        self.next = (self.next + 1) % self.frames.len();

        let image = image::open(path).map_err(|err| match err {
            image::ImageError::IoError(io_err) => CaptureError::from(io_err),
            other => CaptureError::Unavailable(format!("{}: {other}", path.display())),
        })?;
        Ok(image.to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_frame(dir: &Path, name: &str, shade: u8) {
        RgbImage::from_pixel(8, 8, Rgb([shade, shade, shade]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn encoded_frame_is_base64_jpeg() {
        let frame = RgbImage::from_pixel(16, 16, Rgb([200, 10, 10]));
        let encoded = encode_frame(&frame).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn directory_source_cycles_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "b.png", 200);
        write_frame(dir.path(), "a.png", 10);
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = DirectorySource::open(dir.path()).unwrap();
        assert_eq!(source.len(), 2);

        let shades: Vec<u8> = (0..3)
            .map(|_| source.grab().unwrap().get_pixel(0, 0)[0])
            .collect();
        assert_eq!(shades, vec![10, 200, 10]);
    }

    #[test]
    fn empty_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectorySource::open(dir.path()).unwrap_err();
        assert!(matches!(err, CaptureError::Unavailable(_)));
        assert!(err.is_device_error());
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectorySource::open(&dir.path().join("absent")).unwrap_err();
        assert!(err.is_device_error());
    }

    #[test]
    fn vanished_frame_surfaces_as_device_error() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "a.png", 10);
        let mut source = DirectorySource::open(dir.path()).unwrap();
        fs::remove_file(dir.path().join("a.png")).unwrap();

        assert!(source.grab().unwrap_err().is_device_error());
    }
}
