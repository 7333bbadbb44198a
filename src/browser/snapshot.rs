//! Snapshot capture for observer streaming.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, RgbImage};
use std::io::Cursor;

use super::session::AutomationSession;

const FALLBACK_WIDTH: u32 = 1920;
const FALLBACK_HEIGHT: u32 = 1080;

/// A captured frame of the session's visual state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub base64_data: String,
    pub width: u32,
    pub height: u32,
}

impl Snapshot {
    /// Build a snapshot from raw PNG bytes, falling back to a black frame
    /// when the data does not decode.
    pub fn from_png(png_data: &[u8]) -> Self {
        if png_data.len() < 8 || &png_data[0..8] != b"\x89PNG\r\n\x1a\n" {
            tracing::debug!("Snapshot data is not a PNG, using fallback frame");
            return Self::fallback();
        }

        match image::load_from_memory(png_data) {
            Ok(img) => Self {
                base64_data: STANDARD.encode(png_data),
                width: img.width(),
                height: img.height(),
            },
            Err(e) => {
                tracing::debug!("Failed to decode snapshot: {}", e);
                Self::fallback()
            }
        }
    }

    /// Black frame used when a capture fails, so the observer still gets a
    /// frame instead of a stalled feed.
    pub fn fallback() -> Self {
        let black = RgbImage::from_fn(FALLBACK_WIDTH, FALLBACK_HEIGHT, |_, _| {
            image::Rgb([0u8, 0u8, 0u8])
        });
        let dynamic = DynamicImage::ImageRgb8(black);

        let mut buffer = Cursor::new(Vec::new());
        let _ = dynamic.write_to(&mut buffer, image::ImageFormat::Png);

        Self {
            base64_data: STANDARD.encode(buffer.into_inner()),
            width: FALLBACK_WIDTH,
            height: FALLBACK_HEIGHT,
        }
    }

    /// Capture the session's current frame, degrading to the fallback frame
    /// when the page cannot be photographed.
    pub async fn capture(session: &mut AutomationSession) -> Self {
        match session.try_screenshot().await {
            Some(png) => Self::from_png(&png),
            None => Self::fallback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_snapshot() {
        let snapshot = Snapshot::fallback();
        assert_eq!(snapshot.width, FALLBACK_WIDTH);
        assert_eq!(snapshot.height, FALLBACK_HEIGHT);
        assert!(!snapshot.base64_data.is_empty());
    }

    #[test]
    fn test_from_png_rejects_garbage() {
        let snapshot = Snapshot::from_png(b"not a png at all");
        assert_eq!(snapshot.width, FALLBACK_WIDTH);
    }

    #[test]
    fn test_from_png_roundtrip() {
        // Encode a tiny real PNG and make sure dimensions survive.
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(4, 2, |_, _| image::Rgb([7, 7, 7])));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png).unwrap();

        let snapshot = Snapshot::from_png(buffer.get_ref());
        assert_eq!((snapshot.width, snapshot.height), (4, 2));
    }
}
