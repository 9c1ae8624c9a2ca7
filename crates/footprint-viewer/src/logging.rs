//! Tracing subscriber setup for the desktop viewer

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter used when `RUST_LOG` is not set
fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "debug,footprint_lib=debug,eframe::native=warn,hyper_util=info,walkers=info,egui::context=warn,reqwest::connect=info"
    } else {
        "info,eframe::native=warn,egui::context=warn,walkers=warn"
    }
}

/// Initialize logging
///
/// If `RUST_LOG` is not set, a helpful default is installed first so the
/// filter and any child processes see the same value.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_err() {
        // Safety: single-threaded at startup
        unsafe {
            std::env::set_var("RUST_LOG", default_filter());
        }
    }

    let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());
    let installed = tracing_subscriber::registry().with(fmt_layer).try_init();

    match installed {
        Ok(()) => tracing::info!(
            filter = %std::env::var("RUST_LOG").unwrap_or_default(),
            "Tracing initialized"
        ),
        Err(e) => eprintln!("Tracing subscriber already installed: {e}"),
    }
}

/// Log the crate version once at startup
pub fn log_version_info() {
    tracing::info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "Starting"
    );
}
