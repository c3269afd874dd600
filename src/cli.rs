//! Command-line host.
//!
//! Plays the part of the page: loads an image into a canvas (or leaves the
//! page empty so the screen gets shared), triggers one publisher, and prints
//! whatever it put on screen.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::capture::Canvas;
use crate::config::ShareConfig;
use crate::overlay::PanelNode;
use crate::page::{lock_page, Page, PageHandle};
use crate::publish::qr::QR_CONTAINER_ID;
use crate::publish::upload::RESULT_PANEL_ID;
use crate::publish::{Outcome, QrPublisher, UploadPublisher};

#[derive(Debug, Parser)]
#[command(name = "canvas-share", version, about = "Capture an image and share it")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show a PNG as a QR code pointing at its data URL.
    Qr {
        /// Image to place in the sketch container.
        image: PathBuf,
        /// Also write the QR code to this PNG file.
        #[arg(long)]
        save_qr: Option<PathBuf>,
    },
    /// Upload a PNG (or one frame of the primary screen) and print the link.
    Upload {
        /// Image to upload. Without it the primary monitor is captured.
        image: Option<PathBuf>,
        /// Copy the returned link to the clipboard.
        #[arg(long)]
        copy: bool,
    },
}

fn load_canvas(path: &Path) -> Result<Canvas, Box<dyn std::error::Error>> {
    let image = image::open(path)
        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "canvas".to_string());
    Ok(Canvas::new(id, image.to_rgba8()))
}

fn print_panel(page: &PageHandle, id: &str) {
    if let Some(panel) = lock_page(page).panel(id) {
        print!("{}", panel);
    }
}

pub fn run_qr(
    config: ShareConfig,
    image: &Path,
    save_qr: Option<&Path>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut page = Page::new();
    page.add_canvas(load_canvas(image)?, Some(&config.sketch_container));
    let page = page.into_handle();

    let publisher = QrPublisher::new(page.clone(), config);
    publisher.install_button();
    let outcome = publisher.capture();
    print_panel(&page, QR_CONTAINER_ID);

    if let (Outcome::Displayed(_), Some(path)) = (&outcome, save_qr) {
        let guard = lock_page(&page);
        let qr = guard.panel(QR_CONTAINER_ID).and_then(|panel| {
            panel.nodes.iter().find_map(|node| match node {
                PanelNode::QrCode(qr) => Some(qr),
                _ => None,
            })
        });
        if let Some(qr) = qr {
            qr.image
                .save(path)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            log::info!("[QR] QR code written to {}", path.display());
        }
    }

    Ok(outcome.is_displayed())
}

pub async fn run_upload(
    config: ShareConfig,
    image: Option<&Path>,
    copy: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut page = Page::new();
    if let Some(path) = image {
        page.add_canvas(load_canvas(path)?, None);
    }
    let page = page.into_handle();

    let publisher = UploadPublisher::new(page.clone(), config);
    publisher.install_button();
    let outcome = publisher.on_click().await;

    if outcome.is_displayed() && copy {
        publisher.copy_link().await?;
    }

    print_panel(&page, RESULT_PANEL_ID);
    for alert in lock_page(&page).take_alerts() {
        eprintln!("{}", alert);
    }

    Ok(outcome.is_displayed())
}
