// Interactive topic map window.
//
// Blocks the calling thread until the window is closed, so it must run on
// the main thread after the async runtime has finished.

mod app;
pub mod color;

use anyhow::{anyhow, Result};
use eframe::egui;
use tracing::info;

use crate::output::scatter::ScatterRow;
use app::TopicMapApp;

/// Open the scatter plot of `rows`, labelling each topic series from `names`.
pub fn show(rows: Vec<ScatterRow>, names: Vec<(i32, String)>) -> Result<()> {
    info!(points = rows.len(), topics = names.len(), "Opening topic map");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 750.0])
            .with_min_inner_size([400.0, 300.0])
            .with_transparent(true),
        ..Default::default()
    };

    let app = TopicMapApp::new(rows, names);

    eframe::run_native(
        "pagetopics – Topic Map",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow!("Topic map viewer failed: {e}"))
}
