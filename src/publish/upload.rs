//! Remote upload publisher.
//!
//! Resolves a capture source, PNG-encodes it, POSTs it to an anonymous file
//! host and shows the returned link in a floating panel with a copy control.
//! The panel removes itself after a fixed delay.

use std::sync::Arc;

use super::{Outcome, PublishError, SingleFlight};
use crate::capture::{
    discover_renderer, encode_to_blob, resolve_capture_source, Canvas, DisplayMedia, ImageBlob,
    MonitorDisplayMedia,
};
use crate::clipboard::{Clipboard, SystemClipboard};
use crate::config::{ErrorSurface, ShareConfig};
use crate::overlay::{Anchor, Button, Link, PanelNode};
use crate::page::{lock_page, Page, PageHandle};

pub const UPLOAD_BUTTON_ID: &str = "capture-upload";
pub const UPLOAD_BUTTON_LABEL: &str = "Capture & Upload";
pub const BUSY_LABEL: &str = "Capturing...";
pub const RESULT_PANEL_ID: &str = "upload-result";
pub const RESULT_PANEL_ANCHOR: Anchor = Anchor::bottom_right(70, 20);
pub const COPY_LABEL: &str = "Copy Link";
pub const COPIED_LABEL: &str = "Copied!";

/// Single-attempt multipart uploader.
#[derive(Debug, Clone)]
pub struct Uploader {
    client: reqwest::Client,
    endpoint: String,
    file_name: String,
}

impl Uploader {
    pub fn new(endpoint: impl Into<String>, file_name: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[UPLOAD] Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            endpoint: endpoint.into(),
            file_name: file_name.into(),
        }
    }

    pub fn from_config(config: &ShareConfig) -> Self {
        Self::new(&config.endpoint, &config.upload_filename)
    }

    /// POSTs `blob` as multipart field `file` and returns the hosted URL.
    ///
    /// Exactly one request is made. Any non-2xx status is an error.
    pub async fn upload(&self, blob: ImageBlob) -> Result<String, UploadError> {
        let start = std::time::Instant::now();
        let size = blob.len();

        let part = reqwest::multipart::Part::bytes(blob.bytes)
            .file_name(self.file_name.clone())
            .mime_str(blob.mime)
            .map_err(|e| UploadError::Form(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        log::info!("[UPLOAD] Posting {} bytes to {}", size, self.endpoint);
        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| UploadError::Body(e.to_string()))?;
        let url = body.trim();
        if url.is_empty() {
            return Err(UploadError::EmptyBody);
        }

        log::info!(
            "[UPLOAD] Uploaded {} bytes in {}ms: {}",
            size,
            start.elapsed().as_millis(),
            url
        );
        Ok(url.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Cannot build upload form: {0}")]
    Form(String),

    #[error("Upload request failed: {0}")]
    Request(String),

    #[error("Upload failed: {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("Cannot read upload response: {0}")]
    Body(String),

    #[error("Upload host returned an empty response")]
    EmptyBody,
}

pub struct UploadPublisher {
    page: PageHandle,
    config: ShareConfig,
    uploader: Uploader,
    media: Arc<dyn DisplayMedia>,
    clipboard: Arc<dyn Clipboard>,
    flight: SingleFlight,
}

impl UploadPublisher {
    /// A publisher sampling the primary monitor and writing to the OS
    /// clipboard.
    pub fn new(page: PageHandle, config: ShareConfig) -> Self {
        Self {
            uploader: Uploader::from_config(&config),
            page,
            config,
            media: Arc::new(MonitorDisplayMedia),
            clipboard: Arc::new(SystemClipboard),
            flight: SingleFlight::new(),
        }
    }

    pub fn with_display_media(mut self, media: Arc<dyn DisplayMedia>) -> Self {
        self.media = media;
        self
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    /// Adds the trigger button. Returns `false` if it was already there.
    pub fn install_button(&self) -> bool {
        let installed = lock_page(&self.page)
            .install_button(Button::new(UPLOAD_BUTTON_ID, UPLOAD_BUTTON_LABEL));
        if installed {
            log::info!("[UPLOAD] Capture button installed");
        }
        installed
    }

    /// Captures, encodes and uploads; returns the hosted URL.
    ///
    /// Fails with `Busy` while another run of this publisher is in flight.
    pub async fn capture_and_upload(&self, explicit: Option<Canvas>) -> Result<String, PublishError> {
        let _flight = self.flight.try_acquire()?;
        self.run_pipeline(explicit).await
    }

    async fn run_pipeline(&self, explicit: Option<Canvas>) -> Result<String, PublishError> {
        let source = resolve_capture_source(explicit, &self.page, self.media.clone()).await?;
        log::info!("[UPLOAD] Capturing from {}", source.kind());

        let blob = encode_to_blob(source.into_canvas()).await?;
        let url = self.uploader.upload(blob).await?;
        Ok(url)
    }

    /// Button click handler.
    ///
    /// Disables the button for the duration of the pipeline and restores its
    /// original state in every outcome before returning.
    pub async fn on_click(&self) -> Outcome<String> {
        let _flight = match self.flight.try_acquire() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("[UPLOAD] Capture already in progress, ignoring click");
                return Outcome::Busy;
            }
        };

        let (saved, preferred) = {
            let mut page = lock_page(&self.page);
            let preferred = preferred_canvas(&page);
            let saved = page.button_mut(UPLOAD_BUTTON_ID).map(|button| {
                let saved = (button.label.clone(), button.disabled);
                button.disabled = true;
                button.label = BUSY_LABEL.to_string();
                saved
            });
            (saved, preferred)
        };

        let result = self.run_pipeline(preferred).await;

        if let Some((label, disabled)) = saved {
            if let Some(button) = lock_page(&self.page).button_mut(UPLOAD_BUTTON_ID) {
                button.label = label;
                button.disabled = disabled;
            }
        }

        match result {
            Ok(url) => {
                self.render_result_panel(&url);
                Outcome::Displayed(url)
            }
            Err(err) => {
                log::error!("[UPLOAD] Error capturing or uploading: {}", err);
                self.surface_error(&err);
                Outcome::Failed(err)
            }
        }
    }

    /// Shows `url` in the result panel, replacing any previous result, and
    /// arms the dismiss timer. Outside a Tokio runtime the panel stays up
    /// until it is replaced.
    pub fn render_result_panel(&self, url: &str) -> u64 {
        let nodes = vec![
            PanelNode::Text("Uploaded: ".to_string()),
            PanelNode::Link(Link {
                href: url.to_string(),
                text: url.to_string(),
                download: None,
                new_context: true,
            }),
            PanelNode::CopyButton {
                label: COPY_LABEL.to_string(),
            },
        ];
        self.mount_panel(nodes)
    }

    fn surface_error(&self, err: &PublishError) {
        let message = format!("Error: {}", err);
        match self.config.error_surface {
            ErrorSurface::Inline => {
                self.mount_panel(vec![PanelNode::ErrorText(message)]);
            }
            ErrorSurface::Alert => lock_page(&self.page).alert(message),
        }
    }

    fn mount_panel(&self, nodes: Vec<PanelNode>) -> u64 {
        let generation =
            lock_page(&self.page).replace_panel_content(RESULT_PANEL_ID, RESULT_PANEL_ANCHOR, nodes);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::warn!("[PANEL] No runtime to dismiss the result panel: {}", e);
                return generation;
            }
        };

        let page = self.page.clone();
        let ttl = self.config.panel_ttl();
        runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if lock_page(&page).remove_panel_if(RESULT_PANEL_ID, generation) {
                log::debug!("[PANEL] Result panel dismissed after {}s", ttl.as_secs());
            }
        });

        generation
    }

    /// Copy control handler: writes the panel's link to the clipboard,
    /// relabels the control and reverts the label after a short delay.
    ///
    /// Returns `Ok(false)` when no result panel with a link is showing.
    pub async fn copy_link(&self) -> Result<bool, PublishError> {
        let link = lock_page(&self.page)
            .panel(RESULT_PANEL_ID)
            .and_then(|p| p.external_link().map(|l| (l.href.clone(), p.generation)));
        let Some((url, generation)) = link else {
            return Ok(false);
        };

        self.clipboard.write_text(&url)?;
        log::info!("[PANEL] Copied {} to clipboard", url);

        set_copy_label(&self.page, generation, COPIED_LABEL);

        let page = self.page.clone();
        let delay = self.config.copy_revert();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            set_copy_label(&page, generation, COPY_LABEL);
        });

        Ok(true)
    }
}

/// What the click handler hands to the pipeline as its explicit canvas:
/// the renderer's surface if one can be found, else the first canvas.
fn preferred_canvas(page: &Page) -> Option<Canvas> {
    discover_renderer(page)
        .and_then(|handle| page.canvas(&handle.canvas_id).cloned())
        .or_else(|| page.first_canvas().cloned())
}

fn set_copy_label(page: &PageHandle, generation: u64, label: &str) {
    let mut page = lock_page(page);
    if let Some(panel) = page.panel_mut(RESULT_PANEL_ID) {
        if panel.generation == generation {
            panel.set_copy_button_label(label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RendererHandle;
    use crate::clipboard::ClipboardError;
    use image::RgbaImage;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MemoryClipboard {
        text: Mutex<Option<String>>,
    }

    impl Clipboard for MemoryClipboard {
        fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            *self.text.lock().unwrap() = Some(text.to_string());
            Ok(())
        }
    }

    fn offline_config() -> ShareConfig {
        ShareConfig {
            // Nothing listens on port 1; the request fails fast.
            endpoint: "http://127.0.0.1:1".to_string(),
            ..ShareConfig::default()
        }
    }

    fn page_with_canvas() -> PageHandle {
        let mut page = Page::new();
        page.add_canvas(Canvas::new("scene", RgbaImage::new(4, 4)), None);
        page.into_handle()
    }

    fn result_panel_present(publisher: &UploadPublisher) -> bool {
        lock_page(publisher.page()).panel(RESULT_PANEL_ID).is_some()
    }

    #[tokio::test(start_paused = true)]
    async fn result_panel_dismisses_itself() {
        let publisher = UploadPublisher::new(Page::new().into_handle(), ShareConfig::default());
        publisher.render_result_panel("https://0x0.st/abc.png");

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(result_panel_present(&publisher));

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(!result_panel_present(&publisher));
    }

    #[test]
    fn result_panel_renders_without_runtime() {
        let publisher = UploadPublisher::new(Page::new().into_handle(), ShareConfig::default());
        let first = publisher.render_result_panel("https://0x0.st/abc.png");
        let second = publisher.render_result_panel("https://0x0.st/def.png");

        assert!(second > first);
        let page = lock_page(publisher.page());
        let panel = page.panel(RESULT_PANEL_ID).unwrap();
        assert_eq!(
            panel.external_link().map(|l| l.href.as_str()),
            Some("https://0x0.st/def.png")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_keeps_newer_panel() {
        let publisher = UploadPublisher::new(Page::new().into_handle(), ShareConfig::default());
        publisher.render_result_panel("https://0x0.st/old.png");
        tokio::time::sleep(Duration::from_secs(20)).await;
        publisher.render_result_panel("https://0x0.st/new.png");

        tokio::time::sleep(Duration::from_secs(15)).await;
        tokio::task::yield_now().await;
        {
            let page = lock_page(publisher.page());
            let panel = page.panel(RESULT_PANEL_ID).unwrap();
            assert_eq!(
                panel.external_link().map(|l| l.href.as_str()),
                Some("https://0x0.st/new.png")
            );
            assert_eq!(page.panels().len(), 1);
        }

        tokio::time::sleep(Duration::from_secs(20)).await;
        tokio::task::yield_now().await;
        assert!(!result_panel_present(&publisher));
    }

    #[tokio::test(start_paused = true)]
    async fn copy_relabels_then_reverts() {
        let clipboard = Arc::new(MemoryClipboard::default());
        let publisher = UploadPublisher::new(Page::new().into_handle(), ShareConfig::default())
            .with_clipboard(clipboard.clone());
        publisher.render_result_panel("https://0x0.st/abc.png");

        assert!(publisher.copy_link().await.unwrap());
        assert_eq!(
            clipboard.text.lock().unwrap().as_deref(),
            Some("https://0x0.st/abc.png")
        );

        let label = |p: &UploadPublisher| {
            lock_page(p.page())
                .panel(RESULT_PANEL_ID)
                .and_then(|panel| panel.copy_button_label().map(str::to_string))
        };
        assert_eq!(label(&publisher).as_deref(), Some(COPIED_LABEL));

        tokio::time::sleep(Duration::from_millis(2100)).await;
        tokio::task::yield_now().await;
        assert_eq!(label(&publisher).as_deref(), Some(COPY_LABEL));
    }

    #[tokio::test]
    async fn copy_without_panel_does_nothing() {
        let clipboard = Arc::new(MemoryClipboard::default());
        let publisher = UploadPublisher::new(Page::new().into_handle(), ShareConfig::default())
            .with_clipboard(clipboard.clone());

        assert!(!publisher.copy_link().await.unwrap());
        assert!(clipboard.text.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_click_restores_button_and_shows_inline_error() {
        let publisher = UploadPublisher::new(page_with_canvas(), offline_config());
        publisher.install_button();

        let outcome = publisher.on_click().await;
        assert!(matches!(outcome, Outcome::Failed(PublishError::Transport(_))));

        let page = lock_page(publisher.page());
        let button = page.button(UPLOAD_BUTTON_ID).unwrap();
        assert_eq!(button.label, UPLOAD_BUTTON_LABEL);
        assert!(!button.disabled);

        let panel = page.panel(RESULT_PANEL_ID).unwrap();
        assert!(matches!(
            panel.nodes.as_slice(),
            [PanelNode::ErrorText(text)] if text.starts_with("Error: ")
        ));
    }

    #[tokio::test]
    async fn alert_surface_queues_alert_instead_of_panel() {
        let config = ShareConfig {
            error_surface: ErrorSurface::Alert,
            ..offline_config()
        };
        let publisher = UploadPublisher::new(page_with_canvas(), config);
        publisher.install_button();

        assert!(publisher.on_click().await.error().is_some());

        let mut page = lock_page(publisher.page());
        assert!(page.panel(RESULT_PANEL_ID).is_none());
        let alerts = page.take_alerts();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].starts_with("Error: Upload request failed"));
    }

    #[test]
    fn click_prefers_registered_renderer_canvas() {
        let mut page = Page::new();
        page.add_canvas(Canvas::new("hud", RgbaImage::new(2, 2)), None);
        page.add_canvas(Canvas::new("gl", RgbaImage::new(2, 2)), None);
        page.register_renderer(RendererHandle::new("scene", "gl"));

        assert_eq!(preferred_canvas(&page).map(|c| c.id().to_string()).as_deref(), Some("gl"));
    }

    #[test]
    fn click_falls_back_to_first_canvas() {
        let mut page = Page::new();
        page.add_canvas(Canvas::new("a", RgbaImage::new(2, 2)), None);
        page.add_canvas(Canvas::new("b", RgbaImage::new(2, 2)), None);

        assert_eq!(preferred_canvas(&page).map(|c| c.id().to_string()).as_deref(), Some("a"));
    }
}
