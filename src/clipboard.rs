//! Clipboard access for the copy-link control.

/// Anything that can receive copied text.
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// The OS clipboard via `arboard`.
///
/// `arboard::Clipboard` is not `Sync`, so a fresh handle is opened for every
/// write.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clipboard
            .set_text(text.to_owned())
            .map_err(|e| ClipboardError::WriteFailed(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("Clipboard write failed: {0}")]
    WriteFailed(String),
}
