use clap::{Parser, ValueEnum};
use footprint_lib::{BaseLayer, EngineConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Base layer names accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseLayerArg {
    Osm,
    Satellite,
}

impl From<BaseLayerArg> for BaseLayer {
    fn from(arg: BaseLayerArg) -> Self {
        match arg {
            BaseLayerArg::Osm => BaseLayer::Osm,
            BaseLayerArg::Satellite => BaseLayer::Satellite,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Footprint Viewer - Map and records grid with synchronized selection and spatial queries
pub struct Settings {
    /// JSON records file to load on startup
    #[clap(short, long, value_name = "FILE")]
    pub records: Option<PathBuf>,

    /// Show feature labels on the map
    #[clap(long, default_value = "true", action = clap::ArgAction::Set)]
    pub show_labels: bool,

    /// Initial base map
    #[clap(long, value_enum, default_value = "osm")]
    pub base_layer: BaseLayerArg,

    /// Latitude used by "recenter on me"
    #[clap(long, requires = "home_lon", allow_hyphen_values = true)]
    pub home_lat: Option<f64>,

    /// Longitude used by "recenter on me"
    #[clap(long, requires = "home_lat", allow_hyphen_values = true)]
    pub home_lon: Option<f64>,

    /// Click hit tolerance in pixels
    #[clap(long, default_value = "7.0")]
    pub hit_tolerance: f64,

    /// Milliseconds the map must be still before the in-view set is recomputed
    #[clap(long, default_value = "150")]
    pub settle_ms: u64,

    /// Milliseconds after the last keystroke before a search refetch
    #[clap(long, default_value = "300")]
    pub search_debounce_ms: u64,
}

impl Settings {
    /// Parse the process arguments, exiting with usage on error
    pub fn from_cli() -> Self {
        Settings::parse()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            hit_tolerance_px: self.hit_tolerance.max(0.0),
            settle_window: Duration::from_millis(self.settle_ms),
            search_debounce: Duration::from_millis(self.search_debounce_ms),
            default_show_labels: self.show_labels,
        }
    }

    /// Configured home position as `(lat, lon)`
    pub fn home(&self) -> Option<(f64, f64)> {
        self.home_lat.zip(self.home_lon)
    }
}
