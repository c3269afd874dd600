//! Capture-source resolution.
//!
//! Picks the surface an upload pipeline encodes, in strict priority order:
//! explicit canvas, one screen-share frame, registered renderer canvas,
//! first canvas on the page.

use std::sync::Arc;

use super::screenshot::{sample_one_frame, CaptureError, DisplayMedia, StreamConstraints};
use super::Canvas;
use crate::page::{lock_page, Page, PageHandle};

/// A host-registered 3-D renderer and the canvas it draws into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererHandle {
    pub name: String,
    pub canvas_id: String,
}

impl RendererHandle {
    pub fn new(name: impl Into<String>, canvas_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            canvas_id: canvas_id.into(),
        }
    }
}

/// The surface chosen for one capture, tagged with how it was found.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureSource {
    Explicit(Canvas),
    ScreenShare(Canvas),
    Renderer { name: String, canvas: Canvas },
    PageCanvas(Canvas),
}

impl CaptureSource {
    pub fn canvas(&self) -> &Canvas {
        match self {
            CaptureSource::Explicit(c)
            | CaptureSource::ScreenShare(c)
            | CaptureSource::PageCanvas(c) => c,
            CaptureSource::Renderer { canvas, .. } => canvas,
        }
    }

    pub fn into_canvas(self) -> Canvas {
        match self {
            CaptureSource::Explicit(c)
            | CaptureSource::ScreenShare(c)
            | CaptureSource::PageCanvas(c) => c,
            CaptureSource::Renderer { canvas, .. } => canvas,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CaptureSource::Explicit(_) => "explicit canvas",
            CaptureSource::ScreenShare(_) => "screen share",
            CaptureSource::Renderer { .. } => "renderer canvas",
            CaptureSource::PageCanvas(_) => "page canvas",
        }
    }
}

/// Best-effort lookup of the page's 3-D renderer.
///
/// An explicitly registered renderer wins. Otherwise, as a last resort, a
/// page with exactly one canvas is assumed to be showing renderer output.
pub fn discover_renderer(page: &Page) -> Option<RendererHandle> {
    if let Some(handle) = page.registered_renderer() {
        if page.canvas(&handle.canvas_id).is_some() {
            return Some(handle.clone());
        }
        log::warn!(
            "[CAPTURE] Registered renderer '{}' points at missing canvas '{}'",
            handle.name,
            handle.canvas_id
        );
    }

    if page.canvas_count() == 1 {
        let canvas = page.first_canvas()?;
        log::info!(
            "[CAPTURE] Found single canvas '{}', assuming renderer output",
            canvas.id()
        );
        return Some(RendererHandle::new("single-canvas", canvas.id()));
    }

    None
}

/// Resolves the surface to capture.
///
/// An explicit canvas is always used as given, even an empty one; encoding
/// reports that case.
///
/// The screen-share branch runs on the blocking pool: requesting the stream
/// may sit on a permission prompt for as long as the user likes.
pub async fn resolve_capture_source(
    explicit: Option<Canvas>,
    page: &PageHandle,
    media: Arc<dyn DisplayMedia>,
) -> Result<CaptureSource, CaptureError> {
    if let Some(canvas) = explicit {
        log::info!(
            "[CAPTURE] Using explicit canvas '{}' ({}x{})",
            canvas.id(),
            canvas.width(),
            canvas.height()
        );
        return Ok(CaptureSource::Explicit(canvas));
    }

    if media.is_supported() {
        log::info!("[CAPTURE] Requesting screen-share stream");
        let canvas = tokio::task::spawn_blocking(move || {
            sample_one_frame(media.as_ref(), StreamConstraints::SCREEN_SHARE)
        })
        .await
        .map_err(|e| CaptureError::Task(e.to_string()))??;
        return Ok(CaptureSource::ScreenShare(canvas));
    }

    let page = lock_page(page);

    if let Some(handle) = page.registered_renderer() {
        if let Some(canvas) = page.canvas(&handle.canvas_id) {
            log::info!("[CAPTURE] Using renderer '{}' canvas", handle.name);
            return Ok(CaptureSource::Renderer {
                name: handle.name.clone(),
                canvas: canvas.clone(),
            });
        }
    }

    match page.first_canvas() {
        Some(canvas) => {
            log::info!("[CAPTURE] Falling back to page canvas '{}'", canvas.id());
            Ok(CaptureSource::PageCanvas(canvas.clone()))
        }
        None => Err(CaptureError::NoSourceAvailable),
    }
}
