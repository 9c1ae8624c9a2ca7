//! Footprint Viewer - Application Library
//!
//! The desktop shell around `footprint-lib`: a walkers map, a records grid and
//! the toolbar that drive one [`footprint_lib::MapEngine`].

mod app;
pub mod logging;

pub use app::FootprintViewerApp;

pub const APP_NAME: &str = "Footprint Viewer";

/// Open the main window and block until it closes
///
/// Must be called from inside a tokio runtime context; record fetches are
/// spawned on it.
pub fn run_native() -> eframe::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title(APP_NAME)
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        native_options,
        Box::new(|cc| Ok(Box::new(FootprintViewerApp::new(cc)))),
    )
}
