//! Pure image encoding — functional core.
//!
//! Pixels in, PNG bytes or data URLs out. The only async entry point,
//! [`encode_to_blob`], just moves the same work off the event thread.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

use super::Canvas;

pub const PNG_MIME: &str = "image/png";

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// An encoded image held in memory for exactly one publish.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl ImageBlob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encodes a canvas as PNG bytes.
///
/// A zero-sized surface is rejected up front: the encoder would otherwise
/// hand back an empty buffer.
pub fn encode_png(canvas: &Canvas) -> Result<Vec<u8>, EncodeError> {
    if !canvas.is_valid() {
        return Err(EncodeError::EmptySurface {
            width: canvas.width(),
            height: canvas.height(),
        });
    }

    let mut png_bytes: Vec<u8> = Vec::new();
    canvas
        .pixels()
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| EncodeError::Png(e.to_string()))?;

    if png_bytes.is_empty() {
        return Err(EncodeError::NoOutput);
    }

    Ok(png_bytes)
}

/// Encodes a canvas as a `data:image/png;base64,...` URL.
pub fn to_data_url(canvas: &Canvas) -> Result<String, EncodeError> {
    let png_bytes = encode_png(canvas)?;
    Ok(format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(&png_bytes)))
}

/// Decodes a PNG data URL back into pixels.
pub fn decode_data_url(data_url: &str) -> Result<RgbaImage, EncodeError> {
    let payload = data_url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or(EncodeError::NotPngDataUrl)?;
    let png_bytes = STANDARD
        .decode(payload)
        .map_err(|e| EncodeError::Base64(e.to_string()))?;
    let image = image::load_from_memory_with_format(&png_bytes, ImageFormat::Png)
        .map_err(|e| EncodeError::Png(e.to_string()))?;
    Ok(image.to_rgba8())
}

/// Converts a canvas into a PNG blob on the blocking pool.
pub async fn encode_to_blob(canvas: Canvas) -> Result<ImageBlob, EncodeError> {
    let start = std::time::Instant::now();
    let (width, height) = (canvas.width(), canvas.height());

    let bytes = tokio::task::spawn_blocking(move || encode_png(&canvas))
        .await
        .map_err(|e| EncodeError::Task(e.to_string()))??;

    log::info!(
        "[CAPTURE] Encoded {}x{} PNG in {}ms ({} bytes)",
        width,
        height,
        start.elapsed().as_millis(),
        bytes.len()
    );

    Ok(ImageBlob {
        bytes,
        mime: PNG_MIME,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Surface has no pixels ({width}x{height})")]
    EmptySurface { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Png(String),

    #[error("Encoder returned no image")]
    NoOutput,

    #[error("Not a PNG data URL")]
    NotPngDataUrl,

    #[error("Invalid base64 payload: {0}")]
    Base64(String),

    #[error("Encoding task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker(width: u32, height: u32) -> Canvas {
        let pixels = RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 128])
            }
        });
        Canvas::new("c", pixels)
    }

    #[test]
    fn encode_png_has_magic_bytes() {
        let bytes = encode_png(&checker(4, 4)).unwrap();
        assert_eq!(&bytes[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn zero_sized_canvas_is_rejected() {
        let canvas = Canvas::new("empty", RgbaImage::new(0, 10));
        let result = encode_png(&canvas);
        assert!(matches!(
            result,
            Err(EncodeError::EmptySurface { width: 0, height: 10 })
        ));
    }

    #[test]
    fn data_url_reproduces_pixels() {
        let canvas = checker(3, 5);
        let url = to_data_url(&canvas).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(&decoded, canvas.pixels());
    }

    #[test]
    fn decode_rejects_other_schemes() {
        let result = decode_data_url("https://0x0.st/abc.png");
        assert!(matches!(result, Err(EncodeError::NotPngDataUrl)));
    }

    #[tokio::test]
    async fn encode_to_blob_tags_png_mime() {
        let blob = encode_to_blob(checker(2, 2)).await.unwrap();
        assert_eq!(blob.mime, "image/png");
        assert!(!blob.is_empty());
    }

    #[tokio::test]
    async fn encode_to_blob_fails_for_empty_surface() {
        let canvas = Canvas::new("empty", RgbaImage::new(0, 0));
        assert!(encode_to_blob(canvas).await.is_err());
    }
}
