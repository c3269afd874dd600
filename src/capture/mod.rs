//! Capture domain — public API.
//!
//! This module owns everything between "a surface exists" and "we hold PNG
//! bytes": the canvas type, display-media sampling, capture-source
//! resolution and encoding. External code should only use the items
//! exported here.

mod encode;
mod screenshot;
mod source;

pub use encode::{
    decode_data_url, encode_png, encode_to_blob, to_data_url, EncodeError, ImageBlob,
    PNG_MIME,
};
pub use screenshot::{
    sample_one_frame, CaptureError, DisplayMedia, DisplayStream,
    MonitorDisplayMedia, StreamConstraints,
};
pub use source::{discover_renderer, resolve_capture_source, CaptureSource, RendererHandle};

use image::RgbaImage;

/// A renderable surface: an RGBA pixel buffer tagged with an element id.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    id: String,
    pixels: RgbaImage,
}

impl Canvas {
    pub fn new(id: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            id: id.into(),
            pixels,
        }
    }

    /// An offscreen canvas with no page element behind it.
    pub fn offscreen(pixels: RgbaImage) -> Self {
        Self::new("offscreen", pixels)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// A canvas with a zero dimension has nothing to encode.
    pub fn is_valid(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }
}
