//! Publishing pipelines — QR code and remote upload.
//!
//! Each publisher runs one linear pipeline per trigger and ends in either a
//! displayed result or a displayed error. Neither shares state with the
//! other beyond the page.

pub mod qr;
pub mod upload;

pub use qr::QrPublisher;
pub use upload::{UploadError, UploadPublisher, Uploader};

use std::sync::atomic::{AtomicBool, Ordering};

use crate::capture::{CaptureError, EncodeError};
use crate::clipboard::ClipboardError;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("{0}")]
    CaptureUnavailable(String),

    #[error("No capture method available - please provide a canvas element")]
    NoCaptureSourceAvailable,

    #[error("Failed to capture image: {0}")]
    EncodingFailed(#[from] EncodeError),

    #[error("Upload failed: {status} {reason}")]
    UploadFailed { status: u16, reason: String },

    #[error(transparent)]
    Transport(UploadError),

    #[error(transparent)]
    ScreenShare(CaptureError),

    #[error("Link does not fit in a QR code: {0}")]
    QrEncoding(String),

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    #[error("A capture is already in progress")]
    Busy,
}

impl From<CaptureError> for PublishError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::NoSourceAvailable => PublishError::NoCaptureSourceAvailable,
            other => PublishError::ScreenShare(other),
        }
    }
}

impl From<UploadError> for PublishError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Status { status, reason } => PublishError::UploadFailed { status, reason },
            other => PublishError::Transport(other),
        }
    }
}

/// How a triggered pipeline ended.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The result is on screen.
    Displayed(T),
    /// The error is on screen (inline or as an alert).
    Failed(PublishError),
    /// Another run of the same pipeline was in flight; nothing changed.
    Busy,
}

impl<T> Outcome<T> {
    pub fn is_displayed(&self) -> bool {
        matches!(self, Outcome::Displayed(_))
    }

    pub fn error(&self) -> Option<&PublishError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// At most one pipeline in flight per publisher.
#[derive(Debug, Default)]
pub struct SingleFlight {
    active: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot, or fails with `Busy` while another run holds it.
    pub fn try_acquire(&self) -> Result<FlightGuard<'_>, PublishError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| FlightGuard { owner: self })
            .map_err(|_| PublishError::Busy)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the flight slot when dropped.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    owner: &'a SingleFlight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy_until_release() {
        let flight = SingleFlight::new();
        let guard = flight.try_acquire().unwrap();
        assert!(flight.is_active());
        assert!(matches!(flight.try_acquire(), Err(PublishError::Busy)));
        drop(guard);
        assert!(!flight.is_active());
        assert!(flight.try_acquire().is_ok());
    }

    #[test]
    fn upload_status_maps_to_upload_failed() {
        let err: PublishError = UploadError::Status {
            status: 500,
            reason: "Internal Server Error".into(),
        }
        .into();
        assert!(matches!(err, PublishError::UploadFailed { status: 500, .. }));
        assert_eq!(err.to_string(), "Upload failed: 500 Internal Server Error");
    }

    #[test]
    fn missing_source_maps_to_dedicated_variant() {
        let err: PublishError = CaptureError::NoSourceAvailable.into();
        assert!(matches!(err, PublishError::NoCaptureSourceAvailable));
    }
}
