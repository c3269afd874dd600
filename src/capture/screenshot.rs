//! Screen-share capture using the `xcap` crate.
//!
//! This is the infrastructure layer — it talks to the OS. The rest of the
//! crate only sees the [`DisplayMedia`] / [`DisplayStream`] pair, so tests
//! and embedders can swap in their own stream source.

use image::RgbaImage;
use xcap::Monitor;

use super::Canvas;

/// What a capture pipeline asks the display-media provider for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub video: bool,
    /// Draw the cursor into sampled frames.
    pub cursor: bool,
    pub audio: bool,
}

impl StreamConstraints {
    /// Video only, cursor always visible, no audio.
    pub const SCREEN_SHARE: Self = Self {
        video: true,
        cursor: true,
        audio: false,
    };
}

/// A source of screen-share streams.
pub trait DisplayMedia: Send + Sync {
    /// Whether this host can share its screen at all.
    fn is_supported(&self) -> bool;

    /// Asks for a stream. This is where a user-facing permission prompt
    /// would block.
    fn request_stream(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn DisplayStream>, CaptureError>;
}

/// A live screen-share stream. Holding one keeps the OS capture permission
/// alive until [`DisplayStream::stop_tracks`] is called.
pub trait DisplayStream: Send {
    /// Waits until the stream knows its frame size.
    fn wait_for_metadata(&mut self) -> Result<(u32, u32), CaptureError>;

    /// Reads the current video frame.
    fn grab_frame(&mut self) -> Result<RgbaImage, CaptureError>;

    /// Releases every track of the stream.
    fn stop_tracks(&mut self);
}

/// Requests one stream, draws exactly one frame into an offscreen canvas,
/// and stops the stream whether or not the frame could be read.
pub fn sample_one_frame(
    media: &dyn DisplayMedia,
    constraints: StreamConstraints,
) -> Result<Canvas, CaptureError> {
    let start = std::time::Instant::now();
    let mut stream = media.request_stream(constraints)?;

    let frame = draw_frame(stream.as_mut());
    stream.stop_tracks();

    let canvas = frame?;
    log::info!(
        "[CAPTURE] Sampled {}x{} screen-share frame in {}ms",
        canvas.width(),
        canvas.height(),
        start.elapsed().as_millis()
    );
    Ok(canvas)
}

fn draw_frame(stream: &mut dyn DisplayStream) -> Result<Canvas, CaptureError> {
    let (width, height) = stream.wait_for_metadata()?;
    let frame = stream.grab_frame()?;

    // The offscreen canvas is sized from the metadata, not the frame.
    if frame.dimensions() == (width, height) {
        return Ok(Canvas::offscreen(frame));
    }
    let mut target = RgbaImage::new(width, height);
    image::imageops::replace(&mut target, &frame, 0, 0);
    Ok(Canvas::offscreen(target))
}

/// Display media backed by the primary monitor.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonitorDisplayMedia;

impl DisplayMedia for MonitorDisplayMedia {
    fn is_supported(&self) -> bool {
        Monitor::all().map(|m| !m.is_empty()).unwrap_or(false)
    }

    fn request_stream(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn DisplayStream>, CaptureError> {
        if !constraints.video {
            return Err(CaptureError::Unsupported("video track is required".into()));
        }
        if constraints.cursor {
            log::debug!("[CAPTURE] Monitor capture draws the cursor as the OS composites it");
        }
        let monitor = primary_monitor()?;
        let id = monitor
            .id()
            .map_err(|e| CaptureError::MonitorEnumeration(e.to_string()))?;
        Ok(Box::new(MonitorStream { monitor_id: Some(id) }))
    }
}

fn primary_monitor() -> Result<Monitor, CaptureError> {
    let monitors = Monitor::all().map_err(|e| CaptureError::MonitorEnumeration(e.to_string()))?;

    let mut fallback = None;
    for monitor in monitors {
        if monitor.is_primary().unwrap_or(false) {
            return Ok(monitor);
        }
        fallback.get_or_insert(monitor);
    }
    // No monitor reports as primary: use the first one
    fallback.ok_or(CaptureError::NoPrimaryMonitor)
}

/// A stream over one monitor, tracked by id so the handle stays `Send`
/// on every platform.
struct MonitorStream {
    monitor_id: Option<u32>,
}

impl MonitorStream {
    fn monitor(&self) -> Result<Monitor, CaptureError> {
        let id = self.monitor_id.ok_or(CaptureError::StreamStopped)?;
        Monitor::all()
            .map_err(|e| CaptureError::MonitorEnumeration(e.to_string()))?
            .into_iter()
            .find(|m| m.id().map(|m_id| m_id == id).unwrap_or(false))
            .ok_or_else(|| CaptureError::CaptureFailed(format!("monitor {} disappeared", id)))
    }
}

impl DisplayStream for MonitorStream {
    fn wait_for_metadata(&mut self) -> Result<(u32, u32), CaptureError> {
        let monitor = self.monitor()?;
        let width = monitor
            .width()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
        let height = monitor
            .height()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
        Ok((width, height))
    }

    fn grab_frame(&mut self) -> Result<RgbaImage, CaptureError> {
        self.monitor()?
            .capture_image()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))
    }

    fn stop_tracks(&mut self) {
        if self.monitor_id.take().is_some() {
            log::debug!("[CAPTURE] Screen-share stream stopped");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("No primary monitor found")]
    NoPrimaryMonitor,

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("Screen share not supported: {0}")]
    Unsupported(String),

    #[error("Screen-share stream already stopped")]
    StreamStopped,

    #[error("Screen-share task failed: {0}")]
    Task(String),

    #[error("No capture method available - please provide a canvas element")]
    NoSourceAvailable,
}
