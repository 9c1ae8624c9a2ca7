//! MapEngine - the one object a host talks to
//!
//! Owns the records, the feature index, the viewport tracker, the selection tool
//! and the selection store, and wires them together the same way for every host.
//! The host forwards pointer input and settled extents, and draws whatever
//! [`MapEngine::render_set`] returns.

use crate::{
    DrawShape, Emphasis, Feature, FeatureIndex, FeatureStyler, GeolocationProvider, GeometryKind,
    IndexStats, Interaction, InteractionManager, ListenerId, ParsedGeometry, PointerEvent, Record,
    RecordId, Result, SelectionChange, SelectionProjection, SelectionSource,
    SelectionSyncController, SpatialQueryEngine, StyleDescriptor, ToolMode, ViewportTracker,
};

use geo::{Coord, Rect};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Base map shown under the features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BaseLayer {
    #[default]
    Osm,
    Satellite,
}

/// Host-tunable engine settings
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Click hit radius in screen pixels
    pub hit_tolerance_px: f64,
    /// How long the extent must stay still before it counts as settled
    pub settle_window: Duration,
    /// Quiet period after the last keystroke before a search refetch
    pub search_debounce: Duration,
    /// Initial state of the labels toggle
    pub default_show_labels: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hit_tolerance_px: 7.0,
            settle_window: Duration::from_millis(150),
            search_debounce: Duration::from_millis(300),
            default_show_labels: true,
        }
    }
}

/// One feature ready to draw
#[derive(Debug, Clone)]
pub struct StyledFeature {
    pub id: RecordId,
    pub geometry: Arc<ParsedGeometry>,
    pub label: String,
    pub style: StyleDescriptor,
    pub selected: bool,
}

/// Result of feeding one pointer event
#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    /// Nothing to act on (tool still drawing, or event not relevant)
    Ignored,
    /// A draw completed and replaced the selection
    Queried { shape: DrawShape, hits: Vec<RecordId> },
    /// A feature was hit; its popup is open
    FeatureClicked(RecordId),
    /// Nothing under the pointer; the popup was closed
    Missed,
}

type FeatureClickCallback = Box<dyn FnMut(&Record)>;

pub struct MapEngine {
    config: EngineConfig,
    records: Vec<Record>,
    positions: HashMap<RecordId, usize>,
    index: FeatureIndex,
    viewport: ViewportTracker,
    interaction: InteractionManager,
    selection: SelectionSyncController,
    popup: Option<RecordId>,
    show_labels: bool,
    base_layer: BaseLayer,
    feature_click_callbacks: Vec<FeatureClickCallback>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MapEngine {
    pub fn new(config: EngineConfig) -> Self {
        let show_labels = config.default_show_labels;
        Self {
            config,
            records: Vec::new(),
            positions: HashMap::new(),
            index: FeatureIndex::new(),
            viewport: ViewportTracker::new(),
            interaction: InteractionManager::new(),
            selection: SelectionSyncController::new(),
            popup: None,
            show_labels,
            base_layer: BaseLayer::default(),
            feature_click_callbacks: Vec::new(),
        }
    }

    // --- Records ---

    /// Swap in a freshly fetched record set
    ///
    /// The selection is kept by id, even for ids the new set no longer contains.
    pub fn replace_records(&mut self, records: Vec<Record>) -> IndexStats {
        #[cfg(feature = "profiling")]
        profiling::scope!("engine::replace_records");

        self.positions = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();
        self.records = records;

        let stats = self.index.rebuild(&self.records);
        self.viewport.refresh(&self.index);

        if self.popup.is_some_and(|id| !self.positions.contains_key(&id)) {
            self.popup = None;
        }

        tracing::info!(
            records = self.records.len(),
            features = stats.features,
            invalid = stats.invalid,
            "Records replaced"
        );
        stats
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[inline]
    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.positions.get(&id).and_then(|i| self.records.get(*i))
    }

    #[inline]
    pub fn index(&self) -> &FeatureIndex {
        &self.index
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extent of one record's feature, for "zoom to record"
    pub fn record_extent(&self, id: RecordId) -> Option<Rect<f64>> {
        self.index.get(id).map(Feature::extent)
    }

    /// Combined extent of every feature, for "fit to features"
    #[inline]
    pub fn features_extent(&self) -> Option<Rect<f64>> {
        self.index.bounds()
    }

    // --- Viewport ---

    /// Report an extent that has stopped moving
    pub fn viewport_settled(&mut self, extent: Rect<f64>) {
        self.viewport.on_settled(extent, &self.index);
    }

    #[inline]
    pub fn viewport(&self) -> &ViewportTracker {
        &self.viewport
    }

    // --- Tools and pointer input ---

    pub fn select_tool(&mut self, tool: ToolMode) -> ToolMode {
        let mode = self.interaction.select_tool(tool);
        tracing::debug!(?mode, "Tool selected");
        mode
    }

    #[inline]
    pub fn tool_mode(&self) -> ToolMode {
        self.interaction.mode()
    }

    /// Abort the active tool, e.g. on Escape
    pub fn cancel_tool(&mut self) {
        self.interaction.cancel();
    }

    /// Tool state, for hosts that only learn the pointer position inside their map widget
    #[inline]
    pub fn interaction(&self) -> &InteractionManager {
        &self.interaction
    }

    /// While true the host must not pan the map on drag
    #[inline]
    pub fn captures_drag(&self) -> bool {
        self.interaction.captures_drag()
    }

    /// In-progress shape for rubber-band rendering
    #[inline]
    pub fn draw_preview(&self, pointer: Option<Coord<f64>>) -> Option<DrawShape> {
        self.interaction.preview(pointer)
    }

    /// Feed a pointer event in display units
    ///
    /// `units_per_pixel` converts the configured pixel hit tolerance into
    /// display units at the current zoom.
    pub fn handle_pointer(&mut self, event: PointerEvent, units_per_pixel: f64) -> PointerOutcome {
        let tolerance = self.config.hit_tolerance_px * units_per_pixel;
        match self.interaction.handle(event, tolerance) {
            None => PointerOutcome::Ignored,
            Some(Interaction::Query(shape)) => {
                let hits = self.apply_query(shape);
                PointerOutcome::Queried { shape, hits }
            }
            Some(Interaction::PointSelect {
                at,
                tolerance,
                multi,
            }) => self.point_select(at, tolerance, units_per_pixel, multi),
        }
    }

    /// Run a completed draw and make its result the selection
    pub fn apply_query(&mut self, shape: DrawShape) -> Vec<RecordId> {
        let hits = SpatialQueryEngine::new(&self.index).run(&shape);
        let source = match shape {
            DrawShape::Box { .. } => SelectionSource::BoxQuery,
            DrawShape::Radius { .. } => SelectionSource::RadiusQuery,
        };
        self.selection.set_selection(hits.iter().copied(), source);
        hits
    }

    fn point_select(
        &mut self,
        at: Coord<f64>,
        tolerance: f64,
        units_per_pixel: f64,
        multi: bool,
    ) -> PointerOutcome {
        let order = self.draw_order();
        let hit = SpatialQueryEngine::new(&self.index).point_query_with(at, &order, |feature| {
            self.hit_tolerance(feature, tolerance, units_per_pixel)
        });

        let Some(id) = hit else {
            self.popup = None;
            return PointerOutcome::Missed;
        };

        self.popup = Some(id);
        if multi {
            self.selection.toggle(id, SelectionSource::MapClick);
        }

        if let Some(record) = self.positions.get(&id).and_then(|i| self.records.get(*i)) {
            for callback in self.feature_click_callbacks.iter_mut() {
                callback(record);
            }
        }

        PointerOutcome::FeatureClicked(id)
    }

    /// Hit radius for one feature: markers count out to their painted edge
    fn hit_tolerance(&self, feature: &Feature, base: f64, units_per_pixel: f64) -> f64 {
        let style = FeatureStyler::style_parsed(
            feature.status,
            feature.priority,
            self.selection.contains(feature.id),
            false,
            feature.geometry.kind(),
        );
        match style.emphasis {
            Emphasis::Radius(radius) => {
                let painted = f64::from(radius + style.stroke_width / 2.0) * units_per_pixel;
                base.max(painted)
            }
            Emphasis::FillAlpha(_) => base,
        }
    }

    // --- Selection ---

    /// Replace the selection from the grid's checked rows
    pub fn set_grid_selection(&mut self, ids: impl IntoIterator<Item = RecordId>) -> bool {
        self.selection.set_selection(ids, SelectionSource::Grid)
    }

    /// Flip one grid row
    pub fn toggle_grid_row(&mut self, id: RecordId) -> bool {
        self.selection.toggle(id, SelectionSource::Grid)
    }

    /// Flip the record whose popup is open
    pub fn toggle_popup_record(&mut self) -> bool {
        match self.popup {
            Some(id) => self.selection.toggle(id, SelectionSource::Popup),
            None => false,
        }
    }

    pub fn clear_selection(&mut self) -> bool {
        self.selection.clear(SelectionSource::Programmatic)
    }

    #[inline]
    pub fn selection(&self) -> &SelectionSyncController {
        &self.selection
    }

    #[inline]
    pub fn is_selected(&self, id: RecordId) -> bool {
        self.selection.contains(id)
    }

    /// Selected records in record order; unknown ids contribute nothing
    pub fn selected_records(&self) -> Vec<&Record> {
        self.selection.selected_records(&self.records)
    }

    pub fn selection_projection(&self) -> SelectionProjection {
        self.selection.projection(&self.records, &self.index)
    }

    // --- Popup ---

    #[inline]
    pub fn popup_record(&self) -> Option<&Record> {
        self.popup.and_then(|id| self.record(id))
    }

    /// Show the popup for a record, e.g. from a grid row
    pub fn open_popup(&mut self, id: RecordId) -> bool {
        if self.positions.contains_key(&id) {
            self.popup = Some(id);
            true
        } else {
            false
        }
    }

    pub fn close_popup(&mut self) {
        self.popup = None;
    }

    // --- Rendering ---

    #[inline]
    pub fn show_labels(&self) -> bool {
        self.show_labels
    }

    pub fn set_show_labels(&mut self, show: bool) {
        self.show_labels = show;
    }

    #[inline]
    pub fn base_layer(&self) -> BaseLayer {
        self.base_layer
    }

    pub fn set_base_layer(&mut self, layer: BaseLayer) {
        if self.base_layer != layer {
            tracing::debug!(?layer, "Base layer changed");
        }
        self.base_layer = layer;
    }

    /// Ids to draw, back to front
    ///
    /// Unselected features come first and selected ones on top. Within each group
    /// polygons go under lines, lines under points, then ascending id.
    pub fn draw_order(&self) -> Vec<RecordId> {
        let render = self
            .viewport
            .render_set(&self.index, self.selection.selection().iter().copied());
        let mut order: Vec<(bool, u8, RecordId)> = render
            .into_iter()
            .filter_map(|id| self.index.get(id))
            .map(|feature| {
                let layer = match feature.geometry.kind() {
                    GeometryKind::Polygon | GeometryKind::MultiPolygon => 0,
                    GeometryKind::LineString => 1,
                    GeometryKind::Point => 2,
                };
                (self.selection.contains(feature.id), layer, feature.id)
            })
            .collect();
        order.sort_unstable();
        order.into_iter().map(|(_, _, id)| id).collect()
    }

    /// In-view features plus every selected feature, styled, in draw order
    pub fn render_set(&self) -> Vec<StyledFeature> {
        #[cfg(feature = "profiling")]
        profiling::scope!("engine::render_set");

        self.draw_order()
            .into_iter()
            .filter_map(|id| self.index.get(id))
            .map(|feature| {
                let selected = self.selection.contains(feature.id);
                StyledFeature {
                    id: feature.id,
                    geometry: feature.geometry.clone(),
                    label: feature.label.clone(),
                    style: FeatureStyler::style_parsed(
                        feature.status,
                        feature.priority,
                        selected,
                        self.show_labels,
                        feature.geometry.kind(),
                    ),
                    selected,
                }
            })
            .collect()
    }

    // --- Geolocation ---

    /// Look up the user's position for recentering, as `(lat, lon)`
    ///
    /// The engine holds no map center, so on success the host moves its map; a
    /// failure leaves everything untouched.
    pub fn recenter(&self, provider: &dyn GeolocationProvider) -> Result<(f64, f64)> {
        match provider.current_position() {
            Ok(position) => {
                tracing::info!(lat = position.0, lon = position.1, "Recentering");
                Ok(position)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Recenter failed");
                Err(err)
            }
        }
    }

    // --- Callbacks ---

    /// Called with the full selection and its source after every change
    pub fn on_selection_change(
        &mut self,
        mut callback: impl FnMut(&[RecordId], SelectionSource) + 'static,
    ) -> ListenerId {
        self.selection
            .subscribe(move |change: &SelectionChange| callback(&change.ids, change.source))
    }

    /// Called with the clicked record whenever a feature is hit
    pub fn on_feature_click(&mut self, callback: impl FnMut(&Record) + 'static) {
        self.feature_click_callbacks.push(Box::new(callback));
    }

    /// Drop callbacks and any in-progress draw before the host goes away
    pub fn teardown(&mut self) {
        self.selection.clear_listeners();
        self.feature_click_callbacks.clear();
        self.interaction.cancel();
        self.popup = None;
        tracing::debug!("Engine torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FixedLocation, NoGeolocation, utils};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn mercator(lon: f64, lat: f64) -> Coord<f64> {
        utils::wgs84_to_mercator(lat, lon).0
    }

    fn engine() -> MapEngine {
        let mut engine = MapEngine::new(EngineConfig::default());
        engine.replace_records(vec![
            Record::new(1, "POINT (1 1)").with_status("pending"),
            Record::new(2, "POINT (2 2)").with_status("completed"),
            Record::new(3, "POLYGON ((0 0, 3 0, 3 3, 0 3, 0 0))").with_status("review"),
            Record::new(4, "POINT (40 40)"),
        ]);
        engine.viewport_settled(Rect::new(mercator(-5.0, -5.0), mercator(5.0, 5.0)));
        engine
    }

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.hit_tolerance_px, 7.0);
        assert_eq!(config.settle_window, Duration::from_millis(150));
        assert_eq!(config.search_debounce, Duration::from_millis(300));
        assert!(config.default_show_labels);
    }

    #[test]
    fn test_render_set_draws_selected_last() {
        let mut engine = engine();
        engine.set_grid_selection([1, 4]);

        let ids: Vec<RecordId> = engine.render_set().iter().map(|f| f.id).collect();
        // 4 is out of view but selected, so it is drawn
        assert_eq!(ids, vec![3, 2, 1, 4]);

        let rendered = engine.render_set();
        assert!(rendered.iter().filter(|f| f.selected).all(|f| f.id == 1 || f.id == 4));
    }

    #[test]
    fn test_click_hits_topmost_and_opens_popup() {
        let mut engine = engine();
        let clicked = Rc::new(RefCell::new(Vec::new()));
        let sink = clicked.clone();
        engine.on_feature_click(move |record| sink.borrow_mut().push(record.id));

        // Point 1 sits on top of polygon 3
        let outcome = engine.handle_pointer(
            PointerEvent::Click {
                at: mercator(1.0, 1.0),
                multi: false,
            },
            1.0,
        );
        assert_eq!(outcome, PointerOutcome::FeatureClicked(1));
        assert_eq!(engine.popup_record().map(|r| r.id), Some(1));
        assert!(engine.selection().is_empty());
        assert_eq!(*clicked.borrow(), vec![1]);

        // Empty area closes the popup and leaves the selection alone
        engine.set_grid_selection([2]);
        let outcome = engine.handle_pointer(
            PointerEvent::Click {
                at: mercator(-4.0, -4.0),
                multi: false,
            },
            1.0,
        );
        assert_eq!(outcome, PointerOutcome::Missed);
        assert!(engine.popup_record().is_none());
        assert!(engine.is_selected(2));
    }

    #[test]
    fn test_click_reaches_painted_marker_edge() {
        let mut engine = MapEngine::new(EngineConfig::default());
        engine.replace_records(vec![
            Record::new(1, "POINT (0 0)").with_priority("critical"),
            Record::new(2, "POINT (1 1)").with_priority("low"),
        ]);
        engine.viewport_settled(Rect::new(mercator(-5.0, -5.0), mercator(5.0, 5.0)));
        let click = |x: f64, y: f64| PointerEvent::Click {
            at: Coord { x, y },
            multi: false,
        };

        // 12 px critical marker plus half of its 1 px outline
        assert_eq!(
            engine.handle_pointer(click(10.0, 0.0), 1.0),
            PointerOutcome::FeatureClicked(1)
        );
        assert_eq!(engine.handle_pointer(click(13.0, 0.0), 1.0), PointerOutcome::Missed);
        // Scales with the zoom
        assert_eq!(
            engine.handle_pointer(click(20.0, 0.0), 2.0),
            PointerOutcome::FeatureClicked(1)
        );

        // Markers smaller than the hit tolerance keep the tolerance
        let low = mercator(1.0, 1.0);
        assert_eq!(
            engine.handle_pointer(click(low.x + 6.5, low.y), 1.0),
            PointerOutcome::FeatureClicked(2)
        );
    }

    #[test]
    fn test_multi_click_toggles_selection() {
        let mut engine = engine();
        let click = PointerEvent::Click {
            at: mercator(2.0, 2.0),
            multi: true,
        };
        engine.handle_pointer(click, 1.0);
        assert!(engine.is_selected(2));
        engine.handle_pointer(click, 1.0);
        assert!(!engine.is_selected(2));
    }

    #[test]
    fn test_box_draw_replaces_selection() {
        let mut engine = engine();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        engine.on_selection_change(move |ids, source| {
            sink.borrow_mut().push((ids.to_vec(), source))
        });

        engine.set_grid_selection([4]);
        engine.select_tool(ToolMode::Box);
        let click = |at| PointerEvent::Click { at, multi: false };
        assert_eq!(engine.handle_pointer(click(mercator(0.5, 0.5)), 1.0), PointerOutcome::Ignored);
        let outcome = engine.handle_pointer(click(mercator(2.5, 2.5)), 1.0);

        match outcome {
            PointerOutcome::Queried { hits, .. } => assert_eq!(hits, vec![1, 2, 3]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(engine.tool_mode(), ToolMode::None);

        let changes = changes.borrow();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1], (vec![1, 2, 3], SelectionSource::BoxQuery));
    }

    #[test]
    fn test_popup_toggle_reports_popup_source() {
        let mut engine = engine();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        engine.on_selection_change(move |ids, source| {
            sink.borrow_mut().push((ids.to_vec(), source))
        });

        assert!(!engine.toggle_popup_record());
        engine.open_popup(2);
        assert!(engine.toggle_popup_record());
        assert!(engine.is_selected(2));
        assert_eq!(*changes.borrow(), vec![(vec![2], SelectionSource::Popup)]);
    }

    #[test]
    fn test_selection_survives_refresh() {
        let mut engine = engine();
        engine.set_grid_selection([1, 4]);
        engine.open_popup(4);

        engine.replace_records(vec![Record::new(1, "POINT (1 1)")]);

        assert!(engine.is_selected(4));
        assert_eq!(
            engine.selected_records().iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![1]
        );
        let projection = engine.selection_projection();
        assert_eq!(projection.stale, vec![4]);
        assert!(engine.popup_record().is_none());
    }

    #[test]
    fn test_recenter() {
        let engine = engine();
        assert_eq!(
            engine.recenter(&FixedLocation::new(10.0, 20.0)).unwrap(),
            (10.0, 20.0)
        );
        assert!(engine.recenter(&NoGeolocation).is_err());
    }

    #[test]
    fn test_teardown_drops_callbacks() {
        let mut engine = engine();
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        engine.on_selection_change(move |_, _| *sink.borrow_mut() += 1);

        engine.set_grid_selection([1]);
        engine.teardown();
        engine.set_grid_selection([2]);

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_labels_and_base_layer() {
        let mut engine = engine();
        assert!(engine.render_set().iter().all(|f| f.style.show_label));
        engine.set_show_labels(false);
        assert!(engine.render_set().iter().all(|f| !f.style.show_label));

        engine.set_base_layer(BaseLayer::Satellite);
        assert_eq!(engine.base_layer(), BaseLayer::Satellite);
    }
}
