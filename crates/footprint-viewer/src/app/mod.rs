//! Application module
//!
//! This module provides the main application structure:
//! - Full-screen map view with the engine's features drawn on top
//! - Toolbar with the selection tools, search and view actions
//! - Toggleable sidebar with the records grid and the selection
//! - Drag-and-drop support for JSON record files

mod plugin;
pub(crate) mod settings;
pub(crate) mod source;
mod state;
mod ui_panels;

use crate::app::plugin::{FeaturePlugin, PluginFeedback};
use crate::app::settings::Settings;
use crate::app::state::AppState;
use eframe::egui;
use footprint_lib::{BaseLayer, PointerOutcome, utils};
use geo::Rect;
use std::sync::{Arc, Mutex};
use walkers::{
    HttpTiles, Map, MapMemory, TileId,
    sources::{Attribution, OpenStreetMap, TileSource},
};

/// Esri World Imagery tile source
pub struct SatelliteImagery;

impl TileSource for SatelliteImagery {
    fn tile_url(&self, tile_id: TileId) -> String {
        format!(
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{}/{}/{}",
            tile_id.zoom, tile_id.y, tile_id.x
        )
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            text: "Tiles © Esri, Maxar, Earthstar Geographics",
            url: "https://www.esri.com/",
            logo_light: None,
            logo_dark: None,
        }
    }

    fn max_zoom(&self) -> u8 {
        19
    }
}

fn attribution_text(layer: BaseLayer) -> &'static str {
    match layer {
        BaseLayer::Osm => "© OpenStreetMap contributors",
        BaseLayer::Satellite => "Tiles © Esri, Maxar, Earthstar Geographics",
    }
}

/// Zoom level that fits a lat/lon span, clamped to what the tiles offer
fn zoom_for_span(lat_span: f64, lon_span: f64) -> f64 {
    let max_span = lat_span.abs().max(lon_span.abs());
    if max_span > 0.0 {
        ((4.0 * 360.0 / max_span).log2() - 0.5).clamp(1.0, 18.0)
    } else {
        16.0
    }
}

/// Main application structure
pub struct FootprintViewerApp {
    /// Engine, record source and UI settings
    state: AppState,

    /// Map tiles provider (OpenStreetMap)
    tiles_osm: HttpTiles,

    /// Map tiles provider (satellite imagery)
    tiles_satellite: HttpTiles,

    /// Map state (camera position, zoom, etc.)
    map_memory: MapMemory,

    /// Written by the map plugin each frame, drained after the map is shown
    feedback: Arc<Mutex<PluginFeedback>>,

    /// Whether the startup fetch has been kicked off
    started_initial_fetch: bool,
}

impl FootprintViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = Settings::from_cli();
        let state = AppState::new(&settings);

        let tiles_osm = HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone());
        let tiles_satellite = HttpTiles::new(SatelliteImagery, cc.egui_ctx.clone());

        let mut map_memory = MapMemory::default();
        if let Some((lat, lon)) = settings.home() {
            map_memory.center_at(walkers::lat_lon(lat, lon));
        }

        tracing::info!(
            source = ?state.loader.source_name(),
            base_layer = ?state.engine.base_layer(),
            "Viewer initialized"
        );

        Self {
            state,
            tiles_osm,
            tiles_satellite,
            map_memory,
            feedback: Arc::new(Mutex::new(PluginFeedback::default())),
            started_initial_fetch: false,
        }
    }

    /// Move the camera so a display-unit extent fills the view
    fn fit_extent(&mut self, extent: Rect<f64>) {
        let (min_lat, min_lon) = utils::mercator_to_wgs84(extent.min().x, extent.min().y);
        let (max_lat, max_lon) = utils::mercator_to_wgs84(extent.max().x, extent.max().y);

        let zoom = zoom_for_span(max_lat - min_lat, max_lon - min_lon);
        self.map_memory.center_at(walkers::lat_lon(
            (min_lat + max_lat) / 2.0,
            (min_lon + max_lon) / 2.0,
        ));
        let _ = self.map_memory.set_zoom(zoom);

        tracing::trace!(min_lat, min_lon, max_lat, max_lon, zoom, "Fitted view");
    }

    /// Apply camera requests queued by the panels
    fn apply_view_requests(&mut self) {
        if self.state.pending_fit_bounds && !self.state.loader.is_busy() {
            self.state.pending_fit_bounds = false;
            if let Some(extent) = self.state.engine.features_extent() {
                self.fit_extent(extent);
            }
        }

        if !self.state.pending_zoom_to.is_empty() {
            let ids = std::mem::take(&mut self.state.pending_zoom_to);
            let extent = ids
                .iter()
                .filter_map(|id| self.state.engine.record_extent(*id))
                .reduce(|a, b| utils::union_rect(&a, &b));
            if let Some(extent) = extent {
                self.fit_extent(extent);
            }
        }

        if let Some((lat, lon)) = self.state.pending_center.take() {
            self.map_memory.center_at(walkers::lat_lon(lat, lon));
            let _ = self.map_memory.set_zoom(15.0);
        }
    }

    /// Hand what the map reported to the engine
    fn drain_feedback(&mut self, ctx: &egui::Context) {
        let (events, extent, units_per_pixel) = {
            let mut feedback = match self.feedback.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            (
                std::mem::take(&mut feedback.events),
                feedback.extent,
                feedback.units_per_pixel,
            )
        };

        for event in events {
            match self.state.engine.handle_pointer(event, units_per_pixel) {
                PointerOutcome::Queried { shape, hits } => {
                    tracing::info!(?shape, hits = hits.len(), "Spatial query applied");
                }
                PointerOutcome::FeatureClicked(id) => {
                    tracing::debug!(record_id = id, "Popup opened");
                }
                PointerOutcome::Missed | PointerOutcome::Ignored => {}
            }
        }

        if let Some(extent) = extent {
            self.state.update_extent(extent, ctx, instant::Instant::now());
        }
    }
}

impl eframe::App for FootprintViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        profiling::scope!("FootprintViewerApp::update");

        ctx.input(|i| {
            if i.key_pressed(egui::Key::F1) {
                self.state.ui_settings.show_help = !self.state.ui_settings.show_help;
            }
            if i.key_pressed(egui::Key::H) && i.modifiers.ctrl {
                self.state.ui_settings.show_help = !self.state.ui_settings.show_help;
            }
        });
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.state.engine.cancel_tool();
        }

        if !self.started_initial_fetch {
            self.started_initial_fetch = true;
            if self.state.loader.source.is_some() {
                self.state.pending_fit_bounds = true;
                self.state.start_fetch(ctx);
            }
        }

        self.state.poll_fetch();
        self.state.update_search(ctx, instant::Instant::now());
        self.apply_view_requests();

        ui_panels::handle_drag_and_drop(ctx, &mut self.state);
        ui_panels::show_file_picker(ctx, &mut self.state);

        if self.state.ui_settings.show_help {
            ui_panels::help_overlay(ctx, &mut self.state.ui_settings.show_help);
        }

        ui_panels::toolbar(ctx, &mut self.state);
        ui_panels::render_sidebar(ctx, &mut self.state);
        ui_panels::record_popup(ctx, &mut self.state);

        let features = {
            profiling::scope!("render_set");
            self.state.engine.render_set()
        };
        let plugin = FeaturePlugin::new(
            features,
            self.state.engine.interaction().clone(),
            self.feedback.clone(),
        );
        let panning = !self.state.engine.captures_drag();
        let base_layer = self.state.engine.base_layer();

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                let tiles: &mut HttpTiles = match base_layer {
                    BaseLayer::Osm => &mut self.tiles_osm,
                    BaseLayer::Satellite => &mut self.tiles_satellite,
                };

                let map = Map::new(Some(tiles), &mut self.map_memory, walkers::lat_lon(0.0, 0.0))
                    .panning(panning)
                    .with_plugin(plugin);
                ui.add(map);

                ui_panels::sidebar_toggle_button(ui, &mut self.state);
                ui_panels::tool_hint(ui, &self.state);

                let screen_rect = ui.max_rect();
                ui.painter().text(
                    screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
                    egui::Align2::CENTER_BOTTOM,
                    attribution_text(base_layer),
                    egui::FontId::proportional(10.0),
                    egui::Color32::from_black_alpha(180),
                );
            });

        self.drain_feedback(ctx);

        // Keep the rubber band following the pointer
        if self.state.engine.interaction().is_drawing() {
            ctx.request_repaint();
        }
    }
}

impl Drop for FootprintViewerApp {
    fn drop(&mut self) {
        self.state.engine.teardown();
    }
}
