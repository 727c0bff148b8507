//! nbview - desktop Jupyter notebook library and viewer
//!
//! Browses a library of notebooks and renders `.ipynb` files: markdown cells
//! as sanitized rich text, code cells as highlighted source with outputs.

mod app;
mod core;
mod ui;

use app::NotebookViewerApp;
use eframe::egui;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::config::AppConfig;

fn main() -> eframe::Result<()> {
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.level_filter())
        .init();

    if let Some(e) = config_error {
        tracing::warn!("Using default config: {:#}", e);
    }
    tracing::info!("Starting nbview...");

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("nbview"),
        ..Default::default()
    };

    eframe::run_native(
        "nbview",
        native_options,
        Box::new(|cc| Ok(Box::new(NotebookViewerApp::new(cc, config)?))),
    )
}
