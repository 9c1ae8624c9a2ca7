//! Footprint Library - Selection and Spatial Query Engine for Geocoded Records
//!
//! This library keeps an interactive map's feature selection, a records grid's row
//! selection and the in-memory "current selection" set consistent, and answers
//! ad-hoc spatial queries (box, radius, click, viewport) against reprojected vector
//! geometry. It is UI-toolkit agnostic: hosts feed it records, pointer events and
//! settled viewport extents, and render what [`MapEngine::render_set`] returns.
//!
//! # Architecture
//!
//! - **[`GeometryCodec`]**: Tagged WKT parsing + Web Mercator reprojection
//! - **[`FeatureIndex`]**: Renderable features keyed by record id, cached by geometry string
//! - **[`FeatureStyler`]**: Pure `(status, priority, selected)` to style mapping
//! - **[`SpatialQueryEngine`]**: Box, radius, point and viewport queries
//! - **[`InteractionManager`]**: Selection tool state machine
//! - **[`SelectionSyncController`]**: Single source of truth for "what is selected"
//! - **[`ViewportTracker`]**: "In view" set recomputed when map movement settles
//! - **[`MapEngine`]**: Owner of all of the above, the only object a host talks to
//!
//! # Coordinates
//!
//! Geographic input is longitude/latitude (EPSG:4326). Everything the engine stores
//! and queries is in Web Mercator meters (EPSG:3857), called "display units" below.

mod codec;
mod debounce;
mod engine;
mod geolocation;
mod index;
mod interaction;
mod query;
mod record;
mod selection;
mod style;
pub mod utils;
mod viewport;

// Public API exports
pub use codec::{GeometryCodec, GeometryKind, ParsedGeometry, Shape};
pub use debounce::Debounced;
pub use engine::{BaseLayer, EngineConfig, MapEngine, PointerOutcome, StyledFeature};
pub use geolocation::{FixedLocation, GeolocationProvider, NoGeolocation};
pub use index::{Feature, FeatureIndex, IndexStats};
pub use interaction::{
    DrawShape, Interaction, InteractionManager, PointerEvent, ToolMode, box_from_points,
};
pub use query::SpatialQueryEngine;
pub use record::{Record, RecordId};
pub use selection::{
    ListenerId, SelectionChange, SelectionProjection, SelectionSource, SelectionSyncController,
};
pub use style::{Emphasis, FeatureStyler, Priority, Rgba, Status, StyleDescriptor};
pub use viewport::ViewportTracker;

/// Error types for the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Geolocation unavailable: {0}")]
    GeolocationUnavailable(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
