//! canvas-share — capture a rendering surface and share it.
//!
//! Two independent publishers sit on top of a shared host surface model:
//! - QR publisher (publish/qr.rs): canvas → PNG data URL → QR code
//! - Upload publisher (publish/upload.rs): best capture source → PNG →
//!   anonymous file host → link panel
//!
//! Hosts integrate through [`install_upload_button`] and
//! [`capture_and_upload`], or the publishers directly. The bundled binary
//! is a thin CLI host (cli.rs).

pub mod capture;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod overlay;
pub mod page;
pub mod publish;

use clap::Parser;
use std::process::ExitCode;

pub use capture::{Canvas, RendererHandle};
pub use config::ShareConfig;
pub use page::{Page, PageHandle};
pub use publish::{Outcome, PublishError, QrPublisher, UploadPublisher};

/// Runs the full upload pipeline, optionally starting from a given canvas.
pub async fn capture_and_upload(
    publisher: &UploadPublisher,
    canvas: Option<Canvas>,
) -> Result<String, PublishError> {
    publisher.capture_and_upload(canvas).await
}

/// Installs the upload trigger button on the publisher's page.
pub fn install_upload_button(publisher: &UploadPublisher) -> bool {
    publisher.install_button()
}

/// Entry point — called by the binary.
pub fn run() -> ExitCode {
    env_logger::init();

    let args = cli::Cli::parse();
    let config = match ShareConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command {
        cli::Command::Qr { image, save_qr } => {
            cli::run_qr(config, &image, save_qr.as_deref())
        }
        cli::Command::Upload { image, copy } => {
            runtime.block_on(cli::run_upload(config, image.as_deref(), copy))
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
