//! Local QR publisher.
//!
//! Captures the first canvas inside the sketch container, turns it into a
//! PNG data URL and shows that URL as a QR code, next to a download link
//! and a bounded preview, in a fixed top-right container. Every failure is
//! rendered inline in the same container.

use image::Luma;
use qrcode::render::unicode;
use qrcode::{EcLevel, QrCode};

use super::{Outcome, PublishError, SingleFlight};
use crate::capture::{to_data_url, Canvas};
use crate::config::ShareConfig;
use crate::overlay::{Anchor, Button, Link, PanelNode, Preview, QrImage};
use crate::page::{lock_page, PageHandle};

pub const QR_CONTAINER_ID: &str = "qr-container";
pub const QR_CONTAINER_ANCHOR: Anchor = Anchor::top_right(10, 10);
pub const QR_BUTTON_ID: &str = "capture-share";
pub const QR_BUTTON_LABEL: &str = "Capture & Share";

pub struct QrPublisher {
    page: PageHandle,
    config: ShareConfig,
    flight: SingleFlight,
}

impl QrPublisher {
    pub fn new(page: PageHandle, config: ShareConfig) -> Self {
        Self {
            page,
            config,
            flight: SingleFlight::new(),
        }
    }

    /// Adds the trigger button. Returns `false` if it was already there.
    pub fn install_button(&self) -> bool {
        lock_page(&self.page).install_button(Button::new(QR_BUTTON_ID, QR_BUTTON_LABEL))
    }

    /// Runs the capture pipeline and renders its result into the container.
    ///
    /// Never returns an error: failures end up as inline text and are
    /// reported through [`Outcome::Failed`].
    pub fn capture(&self) -> Outcome<String> {
        let _flight = match self.flight.try_acquire() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("[QR] Capture already in progress, ignoring trigger");
                return Outcome::Busy;
            }
        };

        let start = std::time::Instant::now();
        match self.build_panel() {
            Ok((data_url, nodes)) => {
                lock_page(&self.page).replace_panel_content(
                    QR_CONTAINER_ID,
                    QR_CONTAINER_ANCHOR,
                    nodes,
                );
                log::info!(
                    "[QR] Published {} byte data URL in {}ms",
                    data_url.len(),
                    start.elapsed().as_millis()
                );
                Outcome::Displayed(data_url)
            }
            Err(err) => {
                log::error!("[QR] Capture failed: {}", err);
                lock_page(&self.page).replace_panel_content(
                    QR_CONTAINER_ID,
                    QR_CONTAINER_ANCHOR,
                    vec![PanelNode::ErrorText(format!("Capture Error: {}", err))],
                );
                Outcome::Failed(err)
            }
        }
    }

    /// A missing container and an empty one read the same to the user.
    fn locate_canvas(&self) -> Result<Canvas, PublishError> {
        let container = &self.config.sketch_container;
        let page = lock_page(&self.page);

        if !page.has_container(container) {
            log::debug!("[QR] Container '{}' is not on the page", container);
        }
        page.first_canvas_in(container).cloned().ok_or_else(|| {
            PublishError::CaptureUnavailable(format!("No canvas found in {}", container))
        })
    }

    fn build_panel(&self) -> Result<(String, Vec<PanelNode>), PublishError> {
        let canvas = self.locate_canvas()?;
        let data_url = to_data_url(&canvas)?;

        let link = Link {
            href: data_url.clone(),
            text: "Download Image".to_string(),
            download: Some(self.config.download_filename.clone()),
            new_context: false,
        };
        let qr = render_qr(&link.href, self.config.qr_module_size)?;
        let preview = Preview {
            src: data_url.clone(),
            natural_size: (canvas.width(), canvas.height()),
            max_size: (self.config.preview_max, self.config.preview_max),
        };

        let nodes = vec![
            PanelNode::QrCode(qr),
            PanelNode::Link(link),
            PanelNode::Preview(preview),
        ];
        Ok((data_url, nodes))
    }
}

/// Encodes `payload` as a QR symbol at error-correction level M.
pub fn render_qr(payload: &str, module_size: u32) -> Result<QrImage, PublishError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| PublishError::QrEncoding(e.to_string()))?;

    let image = code
        .render::<Luma<u8>>()
        .module_dimensions(module_size, module_size)
        .build();
    let text = code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    Ok(QrImage {
        payload: payload.to_string(),
        image,
        text,
    })
}
