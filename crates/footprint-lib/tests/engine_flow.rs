//! End-to-end engine flow: fetch, settle, draw, select, refetch

use footprint_lib::{
    EngineConfig, MapEngine, PointerEvent, PointerOutcome, Record, RecordId, SelectionSource,
    ToolMode, utils,
};
use geo::{Coord, Point, Rect};
use std::cell::RefCell;
use std::rc::Rc;

fn mercator(lon: f64, lat: f64) -> Coord<f64> {
    utils::wgs84_to_mercator(lat, lon).0
}

fn view(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Rect<f64> {
    Rect::new(mercator(lon_min, lat_min), mercator(lon_max, lat_max))
}

fn fetch() -> Vec<Record> {
    vec![
        Record::new(10, "SRID=4326;POINT (-0.1276 51.5072)")
            .with_status("in_progress")
            .with_priority("high")
            .with_name("Westminster"),
        Record::new(11, "SRID=4326;POINT (-0.0877 51.5079)").with_status("pending"),
        Record::new(
            12,
            "SRID=4326;POLYGON ((-0.15 51.49, -0.13 51.49, -0.13 51.50, -0.15 51.50, -0.15 51.49))",
        )
        .with_status("review"),
        Record::new(13, "SRID=4326;POINT (2.3522 48.8566)").with_status("completed"),
        Record::new(14, "SRID=4326;CIRCULARSTRING (0 0, 1 1, 2 0)"),
        Record {
            id: 15,
            geometry: None,
            status: "on_hold".to_string(),
            ..Default::default()
        },
    ]
}

#[test]
fn test_fetch_settle_and_render() {
    let mut engine = MapEngine::new(EngineConfig::default());
    let stats = engine.replace_records(fetch());

    assert_eq!(stats.features, 4);
    assert_eq!(stats.invalid, 1);
    assert_eq!(stats.missing, 1);

    // Nothing is in view until the first extent settles
    assert!(engine.render_set().is_empty());

    engine.viewport_settled(view(-0.2, 51.45, 0.0, 51.55));
    let ids: Vec<RecordId> = engine.render_set().iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![12, 10, 11]);
}

#[test]
fn test_radius_select_then_pan_away() {
    let mut engine = MapEngine::new(EngineConfig::default());
    engine.replace_records(fetch());
    engine.viewport_settled(view(-0.2, 51.45, 0.0, 51.55));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    engine.on_selection_change(move |ids, source| sink.borrow_mut().push((ids.to_vec(), source)));

    // Drag a 500 m circle around Westminster
    engine.select_tool(ToolMode::Radius);
    assert!(engine.captures_drag());
    let center = Point::new(-0.1276, 51.5072);
    let edge = utils::destination_point(center, 0.0, 500.0);
    let (center, edge) = (mercator(center.x(), center.y()), mercator(edge.x(), edge.y()));
    engine.handle_pointer(PointerEvent::Press { at: center }, 1.0);
    engine.handle_pointer(PointerEvent::Move { at: edge }, 1.0);
    let outcome = engine.handle_pointer(PointerEvent::Release { at: edge }, 1.0);

    match outcome {
        PointerOutcome::Queried { hits, .. } => assert_eq!(hits, vec![10]),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!engine.captures_drag());
    assert_eq!(*seen.borrow(), vec![(vec![10], SelectionSource::RadiusQuery)]);

    // Pan to Paris: Westminster leaves the view but stays rendered as selected
    engine.viewport_settled(view(2.0, 48.5, 2.6, 49.0));
    assert!(!engine.viewport().in_view(10));
    let rendered: Vec<(RecordId, bool)> = engine
        .render_set()
        .iter()
        .map(|f| (f.id, f.selected))
        .collect();
    assert_eq!(rendered, vec![(13, false), (10, true)]);
}

#[test]
fn test_grid_and_map_stay_in_sync_across_refetch() {
    let mut engine = MapEngine::new(EngineConfig::default());
    engine.replace_records(fetch());
    engine.viewport_settled(view(-0.2, 51.45, 0.0, 51.55));

    engine.set_grid_selection([11, 13, 15]);
    let projection = engine.selection_projection();
    assert_eq!(projection.selected_count(), 3);
    // 15 has no geometry and 13 is out of view; only features get highlighted
    assert_eq!(projection.highlighted.iter().copied().collect::<Vec<_>>(), vec![11, 13]);

    // A refetch that drops record 13
    let refetched: Vec<Record> = fetch().into_iter().filter(|r| r.id != 13).collect();
    engine.replace_records(refetched);

    let projection = engine.selection_projection();
    assert_eq!(projection.stale, vec![13]);
    assert_eq!(
        engine.selected_records().iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![11, 15]
    );
    assert!(engine.render_set().iter().all(|f| f.id != 13));
}

#[test]
fn test_switching_tools_mid_box_emits_nothing() {
    let mut engine = MapEngine::new(EngineConfig::default());
    engine.replace_records(fetch());

    let changes = Rc::new(RefCell::new(0));
    let sink = changes.clone();
    engine.on_selection_change(move |_, _| *sink.borrow_mut() += 1);

    engine.select_tool(ToolMode::Box);
    engine.handle_pointer(
        PointerEvent::Click {
            at: mercator(-0.2, 51.45),
            multi: false,
        },
        1.0,
    );
    engine.select_tool(ToolMode::Radius);
    let outcome = engine.handle_pointer(
        PointerEvent::Click {
            at: mercator(0.0, 51.55),
            multi: false,
        },
        1.0,
    );

    assert_eq!(outcome, PointerOutcome::Ignored);
    assert_eq!(*changes.borrow(), 0);
    assert!(engine.selection().is_empty());
}
