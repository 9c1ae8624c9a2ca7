#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

// The binary uses the library, not duplicate modules
use footprint_viewer::logging;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::setup_logging();
    logging::log_version_info();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    // Fetch tasks are spawned from the UI thread, so it must see the runtime
    let _guard = rt.enter();
    footprint_viewer::run_native()?;

    Ok(())
}
