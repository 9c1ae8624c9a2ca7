//! Application state management
//!
//! This module owns the engine, the record source and its in-flight fetch, the
//! debouncers, and the UI settings that are not part of the engine.

use crate::app::settings::Settings;
use crate::app::source::{JsonFileSource, RecordQuery, RecordSource, SourceError};
use footprint_lib::{
    Debounced, FixedLocation, IndexStats, MapEngine, Record, RecordId, SelectionSource,
};
use geo::Rect;
use instant::Instant;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Main application state
pub struct AppState {
    /// Selection, index, queries and styling
    pub engine: MapEngine,

    /// Current UI settings
    pub ui_settings: UiSettings,

    /// Record source and fetch bookkeeping
    pub loader: RecordLoader,

    /// Search box contents and its debouncer
    pub search_text: String,
    pub search: Debounced<String>,

    /// Search text of the most recent fetch
    pub last_search: String,

    /// Last reported map extent and its settle debouncer
    pub last_extent: Option<Rect<f64>>,
    pub settle: Debounced<Rect<f64>>,

    /// Position used by "recenter on me", if configured
    pub home: Option<FixedLocation>,

    /// Messages shown in the sidebar until dismissed
    pub messages: Vec<UiMessage>,

    /// Last selection change reported by the engine
    pub last_change: Rc<RefCell<Option<(usize, SelectionSource)>>>,

    /// Requests for the map view, applied on the next frame
    pub pending_fit_bounds: bool,
    pub pending_center: Option<(f64, f64)>,
    pub pending_zoom_to: Vec<RecordId>,
}

/// UI-specific settings that can be adjusted at runtime
#[derive(Clone)]
pub struct UiSettings {
    /// Whether sidebar is open
    pub sidebar_open: bool,

    /// Current active tab in sidebar
    pub active_tab: SidebarTab,

    /// Show only rows whose feature is in view
    pub only_in_view: bool,

    /// Show the help overlay
    pub show_help: bool,
}

/// Sidebar tabs
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SidebarTab {
    Records,
    Selection,
    Settings,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MessageLevel {
    Info,
    Error,
}

#[derive(Clone, Debug)]
pub struct UiMessage {
    pub level: MessageLevel,
    pub text: String,
}

/// Receiving end of one fetch
pub struct PendingFetch {
    pub query: RecordQuery,
    pub started: Instant,
    receiver: oneshot::Receiver<Result<Vec<Record>, SourceError>>,
}

/// Record source plus the fetch currently in flight
#[derive(Default)]
pub struct RecordLoader {
    pub source: Option<Arc<dyn RecordSource>>,
    pub pending: Option<PendingFetch>,
    pub show_picker: bool,
    pub last_stats: Option<IndexStats>,
    pub last_fetch_ms: f64,
}

impl RecordLoader {
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn source_name(&self) -> Option<String> {
        self.source.as_ref().map(|s| s.describe())
    }
}

impl AppState {
    /// Create new application state from CLI settings
    pub fn new(settings: &Settings) -> Self {
        let config = settings.engine_config();
        let search = Debounced::new(config.search_debounce);
        let settle = Debounced::new(config.settle_window);

        let mut engine = MapEngine::new(config);
        engine.set_base_layer(settings.base_layer.into());

        let last_change = Rc::new(RefCell::new(None));
        let sink = last_change.clone();
        engine.on_selection_change(move |ids, source| {
            *sink.borrow_mut() = Some((ids.len(), source));
        });
        engine.on_feature_click(|record| {
            tracing::debug!(record_id = record.id, label = %record.label(), "Feature clicked");
        });

        let loader = RecordLoader {
            source: settings
                .records
                .as_ref()
                .map(|path| Arc::new(JsonFileSource::new(path)) as Arc<dyn RecordSource>),
            ..Default::default()
        };

        Self {
            engine,
            ui_settings: UiSettings {
                sidebar_open: true,
                active_tab: SidebarTab::Records,
                only_in_view: false,
                show_help: false,
            },
            loader,
            search_text: String::new(),
            search,
            last_search: String::new(),
            last_extent: None,
            settle,
            home: settings
                .home()
                .map(|(lat, lon)| FixedLocation::new(lat, lon)),
            messages: Vec::new(),
            last_change,
            pending_fit_bounds: false,
            pending_center: None,
            pending_zoom_to: Vec::new(),
        }
    }

    /// Switch to a JSON file and fetch from it
    pub fn open_file(&mut self, path: PathBuf, ctx: &egui::Context) {
        tracing::info!(path = %path.display(), "Opening records file");
        self.loader.source = Some(Arc::new(JsonFileSource::new(path)));
        self.pending_fit_bounds = true;
        self.start_fetch(ctx);
    }

    /// Fetch with the current search text
    ///
    /// A fetch already in flight is abandoned; only the newest result is applied.
    pub fn start_fetch(&mut self, ctx: &egui::Context) {
        self.last_search = self.search_text.clone();
        let Some(source) = self.loader.source.clone() else {
            return;
        };

        let query = RecordQuery::new(self.search_text.trim());
        let (sender, receiver) = oneshot::channel();
        let repaint = ctx.clone();
        let task_query = query.clone();
        tokio::spawn(async move {
            let result = source.fetch(task_query).await;
            // The receiver is gone if a newer fetch replaced this one
            let _ = sender.send(result);
            repaint.request_repaint();
        });

        if self.loader.pending.is_some() {
            tracing::debug!("Superseding in-flight fetch");
        }
        self.loader.pending = Some(PendingFetch {
            query,
            started: Instant::now(),
            receiver,
        });
    }

    /// Apply a finished fetch, if any
    pub fn poll_fetch(&mut self) {
        let Some(pending) = self.loader.pending.as_mut() else {
            return;
        };

        let result = match pending.receiver.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.loader.pending = None;
                self.push_error("Record fetch was cancelled".to_string());
                return;
            }
        };

        let elapsed = Instant::now().duration_since(pending.started);
        let search = pending.query.search.clone();
        self.loader.pending = None;
        self.loader.last_fetch_ms = elapsed.as_secs_f64() * 1000.0;

        match result {
            Ok(records) => {
                let stats = self.engine.replace_records(records);
                if stats.invalid > 0 {
                    self.push_info(format!(
                        "{} record(s) have geometry that could not be drawn",
                        stats.invalid
                    ));
                }
                tracing::info!(
                    search = %search,
                    features = stats.features,
                    elapsed_ms = self.loader.last_fetch_ms,
                    "Fetch applied"
                );
                self.loader.last_stats = Some(stats);
            }
            Err(error) => {
                tracing::error!(%error, "Record fetch failed");
                self.push_error(error.to_string());
            }
        }
    }

    /// Feed the search box; refetches once typing pauses
    pub fn update_search(&mut self, ctx: &egui::Context, now: Instant) {
        if self.search_text != self.last_search {
            self.search.push_if_changed(self.search_text.clone(), now);
        } else {
            // Typed back to what was last fetched
            self.search.cancel();
        }
        if self.search.poll(now).is_some() {
            self.start_fetch(ctx);
        }
        if let Some(remaining) = self.search.remaining(now) {
            ctx.request_repaint_after(remaining);
        }
    }

    /// Feed the current map extent; the engine sees it once the map holds still
    ///
    /// The very first extent is applied immediately.
    pub fn update_extent(&mut self, extent: Rect<f64>, ctx: &egui::Context, now: Instant) {
        if self.last_extent.is_none() {
            self.last_extent = Some(extent);
            self.engine.viewport_settled(extent);
            return;
        }

        if self.last_extent != Some(extent) {
            self.last_extent = Some(extent);
            self.settle.push(extent, now);
        }
        if let Some(settled) = self.settle.poll(now) {
            self.engine.viewport_settled(settled);
        }
        if let Some(remaining) = self.settle.remaining(now) {
            ctx.request_repaint_after(remaining);
        }
    }

    /// Ask the configured provider where we are and queue a recenter
    pub fn recenter(&mut self) {
        let result = match &self.home {
            Some(provider) => self.engine.recenter(provider),
            None => self.engine.recenter(&footprint_lib::NoGeolocation),
        };
        match result {
            Ok(position) => self.pending_center = Some(position),
            Err(error) => self.push_error(error.to_string()),
        }
    }

    pub fn push_info(&mut self, text: String) {
        self.messages.push(UiMessage {
            level: MessageLevel::Info,
            text,
        });
    }

    pub fn push_error(&mut self, text: String) {
        self.messages.push(UiMessage {
            level: MessageLevel::Error,
            text,
        });
    }

    /// Selected rows that exist in the current records, for tab and summary counts
    pub fn selected_count(&self) -> usize {
        self.engine.selection_projection().selected_count()
    }

    /// Row ids to list in the grid
    pub fn visible_rows(&self) -> Vec<RecordId> {
        let viewport = self.engine.viewport();
        self.engine
            .records()
            .iter()
            .filter(|record| !self.ui_settings.only_in_view || viewport.in_view(record.id))
            .map(|record| record.id)
            .collect()
    }
}

/// Format a number with thousands separators
pub fn format_number_with_commas(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use footprint_lib::utils;

    fn app_state(args: &[&str]) -> AppState {
        let mut argv = vec!["footprint-viewer"];
        argv.extend_from_slice(args);
        AppState::new(&Settings::parse_from(argv))
    }

    fn view() -> Rect<f64> {
        Rect::new(
            utils::wgs84_to_mercator(51.45, -0.2).0,
            utils::wgs84_to_mercator(51.55, 0.0).0,
        )
    }

    #[test]
    fn test_format_number_with_commas() {
        assert_eq!(format_number_with_commas(0), "0");
        assert_eq!(format_number_with_commas(999), "999");
        assert_eq!(format_number_with_commas(1000), "1,000");
        assert_eq!(format_number_with_commas(1234567), "1,234,567");
    }

    #[test]
    fn test_new_state_from_settings() {
        let state = app_state(&["--records", "sites.json", "--show-labels", "false"]);
        assert_eq!(state.loader.source_name().as_deref(), Some("sites.json"));
        assert!(!state.engine.show_labels());
        assert!(state.home.is_none());
        assert!(!state.loader.is_busy());
    }

    #[test]
    fn test_first_extent_settles_immediately() {
        let ctx = egui::Context::default();
        let mut state = app_state(&[]);
        state
            .engine
            .replace_records(vec![Record::new(1, "POINT (-0.1276 51.5072)")]);

        let t0 = Instant::now();
        state.update_extent(view(), &ctx, t0);
        assert!(state.engine.viewport().in_view(1));

        // Panning away only takes effect after the settle window
        let away = Rect::new(
            utils::wgs84_to_mercator(48.5, 2.0).0,
            utils::wgs84_to_mercator(49.0, 2.6).0,
        );
        state.update_extent(away, &ctx, t0);
        assert!(state.engine.viewport().in_view(1));
        state.update_extent(away, &ctx, t0 + std::time::Duration::from_millis(200));
        assert!(!state.engine.viewport().in_view(1));
    }

    #[test]
    fn test_recenter_without_provider_reports_error() {
        let mut state = app_state(&[]);
        state.recenter();
        assert!(state.pending_center.is_none());
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].level, MessageLevel::Error);

        let mut state = app_state(&["--home-lat", "10", "--home-lon", "20"]);
        state.recenter();
        assert_eq!(state.pending_center, Some((10.0, 20.0)));
    }

    #[test]
    fn test_selection_change_is_recorded() {
        let mut state = app_state(&[]);
        state.engine.replace_records(vec![
            Record::new(1, "POINT (0 0)"),
            Record::new(2, "POINT (1 1)"),
        ]);
        state.engine.set_grid_selection([1, 2]);
        assert_eq!(*state.last_change.borrow(), Some((2, SelectionSource::Grid)));
    }

    #[test]
    fn test_selected_count_ignores_dropped_records() {
        let mut state = app_state(&[]);
        state.engine.replace_records(vec![
            Record::new(1, "POINT (0 0)"),
            Record::new(2, "POINT (1 1)"),
        ]);
        state.engine.set_grid_selection([1, 2]);
        assert_eq!(state.selected_count(), 2);

        // Record 2 is gone after a refetch; it stays selected but is not counted
        state.engine.replace_records(vec![Record::new(1, "POINT (0 0)")]);
        assert_eq!(state.engine.selection().len(), 2);
        assert_eq!(state.selected_count(), 1);
    }

    #[test]
    fn test_visible_rows_respects_in_view_filter() {
        let ctx = egui::Context::default();
        let mut state = app_state(&[]);
        state.engine.replace_records(vec![
            Record::new(1, "POINT (-0.1276 51.5072)"),
            Record::new(2, "POINT (2.3522 48.8566)"),
            Record {
                id: 3,
                ..Default::default()
            },
        ]);
        state.update_extent(view(), &ctx, Instant::now());

        assert_eq!(state.visible_rows(), vec![1, 2, 3]);
        state.ui_settings.only_in_view = true;
        assert_eq!(state.visible_rows(), vec![1]);
    }

    #[tokio::test]
    async fn test_unchanged_search_does_not_refetch() {
        let ctx = egui::Context::default();
        let mut state = app_state(&["--records", "sites.json"]);
        let t0 = Instant::now();
        let frame = |i: u64| t0 + std::time::Duration::from_millis(16 * i);

        // Three seconds of frames without typing
        for i in 0..180 {
            state.update_search(&ctx, frame(i));
            assert!(!state.loader.is_busy(), "refetched at frame {i}");
        }

        // Typing refetches once after the pause
        state.search_text = "bridge".to_string();
        let mut fetches = 0;
        for i in 180..360 {
            state.update_search(&ctx, frame(i));
            if state.loader.pending.take().is_some() {
                fetches += 1;
            }
        }
        assert_eq!(fetches, 1);
        assert_eq!(state.last_search, "bridge");

        // Typing and deleting back to the fetched text is not a new query
        state.search_text = "bridg".to_string();
        state.update_search(&ctx, frame(360));
        state.search_text = "bridge".to_string();
        for i in 361..400 {
            state.update_search(&ctx, frame(i));
            assert!(!state.loader.is_busy());
        }
    }

    #[tokio::test]
    async fn test_fetch_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "footprint-state-{}-{}.json",
            std::process::id(),
            line!()
        ));
        tokio::fs::write(
            &path,
            r#"[{"id": 5, "geometry": "POINT (1 1)", "status": "pending", "priority": "low"},
                {"id": 6, "geometry": "LINESTRING (0 0)", "status": "pending", "priority": "low"}]"#,
        )
        .await
        .unwrap();

        let ctx = egui::Context::default();
        let mut state = app_state(&[]);
        state.open_file(path.clone(), &ctx);
        assert!(state.loader.is_busy());

        for _ in 0..200 {
            state.poll_fetch();
            if !state.loader.is_busy() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(!state.loader.is_busy());
        assert_eq!(state.engine.records().len(), 2);
        let stats = state.loader.last_stats.unwrap();
        assert_eq!(stats.features, 1);
        assert_eq!(stats.invalid, 1);
        assert!(state.pending_fit_bounds);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
