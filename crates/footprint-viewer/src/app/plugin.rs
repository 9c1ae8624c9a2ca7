//! Walkers plugin that draws the engine's render set and reports pointer input
//!
//! The plugin only sees a snapshot: the features are styled by the engine before
//! the frame, and everything the map tells us (extent, scale, clicks, drags) is
//! written to a shared [`PluginFeedback`] for the app to hand to the engine.

use egui::{Color32, Pos2, Stroke};
use footprint_lib::{
    DrawShape, Emphasis, InteractionManager, PointerEvent, Rgba, Shape, StyledFeature, utils,
};
use geo::{Coord, LineString, MapCoords, Polygon, Rect, TriangulateEarcut};
use std::sync::{Arc, Mutex};
use walkers::{Plugin, Projector};

const LABEL_COLOR: Color32 = Color32::from_rgb(20, 20, 20);
const LABEL_HALO: Color32 = Color32::from_rgba_premultiplied(255, 255, 255, 200);
const PREVIEW_COLOR: Color32 = Color32::from_rgb(25, 118, 210);

/// What the map reported during the last frame
#[derive(Debug, Default)]
pub struct PluginFeedback {
    /// Pointer events in display units, oldest first
    pub events: Vec<PointerEvent>,
    /// Visible extent in display units
    pub extent: Option<Rect<f64>>,
    /// Display units covered by one screen pixel
    pub units_per_pixel: f64,
}

/// Plugin for rendering styled features on the map
pub struct FeaturePlugin {
    features: Vec<StyledFeature>,
    interaction: InteractionManager,
    feedback: Arc<Mutex<PluginFeedback>>,
}

impl FeaturePlugin {
    pub fn new(
        features: Vec<StyledFeature>,
        interaction: InteractionManager,
        feedback: Arc<Mutex<PluginFeedback>>,
    ) -> Self {
        Self {
            features,
            interaction,
            feedback,
        }
    }

    fn render_feature(
        &self,
        feature: &StyledFeature,
        projector: &Projector,
        painter: &egui::Painter,
    ) {
        let style = &feature.style;
        let stroke = Stroke::new(style.stroke_width, color32(style.stroke_color));
        let fill = color32(style.fill_color());

        let label_pos = match feature.geometry.shape() {
            Shape::Point(point) => {
                let center = to_screen(projector, point.0);
                let radius = match style.emphasis {
                    Emphasis::Radius(r) => r,
                    Emphasis::FillAlpha(_) => 6.0,
                };
                painter.circle(center, radius, fill, stroke);
                center - egui::vec2(0.0, radius + 2.0)
            }
            Shape::LineString(line) => {
                let points = project_line(line, projector);
                if points.len() >= 2 {
                    painter.add(egui::Shape::line(points, stroke));
                }
                to_screen(projector, feature.geometry.label_anchor()) - egui::vec2(0.0, 4.0)
            }
            Shape::Polygon(polygon) => {
                render_polygon(polygon, projector, painter, fill, stroke);
                to_screen(projector, feature.geometry.label_anchor()) - egui::vec2(0.0, 4.0)
            }
            Shape::MultiPolygon(multi) => {
                for polygon in multi {
                    render_polygon(polygon, projector, painter, fill, stroke);
                }
                to_screen(projector, feature.geometry.label_anchor()) - egui::vec2(0.0, 4.0)
            }
        };

        if style.show_label {
            let font = egui::FontId::proportional(11.0);
            let galley = painter.layout_no_wrap(feature.label.clone(), font, LABEL_COLOR);
            let rect = egui::Align2::CENTER_BOTTOM.anchor_size(label_pos, galley.size());
            painter.rect_filled(rect.expand(1.5), 2.0, LABEL_HALO);
            painter.galley(rect.min, galley, LABEL_COLOR);
        }
    }

    fn render_preview(
        &self,
        shape: DrawShape,
        units_per_pixel: f64,
        projector: &Projector,
        painter: &egui::Painter,
    ) {
        let stroke = Stroke::new(1.5, PREVIEW_COLOR);
        let fill = PREVIEW_COLOR.gamma_multiply(0.15);

        match shape {
            DrawShape::Box { p1, p2 } => {
                let rect =
                    egui::Rect::from_two_pos(to_screen(projector, p1), to_screen(projector, p2));
                painter.rect_filled(rect, 0.0, fill);
                painter.rect_stroke(rect, 0.0, stroke, egui::StrokeKind::Middle);
            }
            DrawShape::Radius { center, radius_m } => {
                if units_per_pixel <= 0.0 {
                    return;
                }
                let (lat, _) = utils::mercator_to_wgs84(center.x, center.y);
                let radius_px = utils::meters_to_display_units(radius_m, lat) / units_per_pixel;
                let center = to_screen(projector, center);
                painter.circle(center, radius_px as f32, fill, stroke);
                painter.text(
                    center + egui::vec2(0.0, -(radius_px as f32) - 4.0),
                    egui::Align2::CENTER_BOTTOM,
                    format_distance(radius_m),
                    egui::FontId::proportional(12.0),
                    PREVIEW_COLOR,
                );
            }
        }
    }
}

impl Plugin for FeaturePlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        _map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("FeaturePlugin::run");

        let viewport_rect = response.rect;
        let painter = ui.painter_at(viewport_rect);

        // Screen corners to display units
        let top_left = to_display(projector, viewport_rect.min);
        let bottom_right = to_display(projector, viewport_rect.max);
        let extent = Rect::new(top_left, bottom_right);
        let units_per_pixel = extent.width() / f64::from(viewport_rect.width().max(1.0));

        let mut events = Vec::new();
        if let Some(pos) = response.interact_pointer_pos() {
            let at = to_display(projector, pos);
            if self.interaction.captures_drag() {
                if response.drag_started() {
                    // egui reports the start once the drag threshold is crossed
                    let origin = ui
                        .input(|i| i.pointer.press_origin())
                        .map(|pos| to_display(projector, pos));
                    events.extend(drag_start_events(origin, at));
                } else if response.drag_stopped() {
                    events.push(PointerEvent::Release { at });
                } else if response.dragged() {
                    events.push(PointerEvent::Move { at });
                }
            }
            if response.clicked() {
                let multi = ui.input(|i| i.modifiers.command || i.modifiers.shift);
                events.push(PointerEvent::Click { at, multi });
            }
        }

        {
            profiling::scope!("render_features");
            for feature in &self.features {
                self.render_feature(feature, projector, &painter);
            }
        }

        let pointer = response.hover_pos().map(|pos| to_display(projector, pos));
        if let Some(shape) = self.interaction.preview(pointer) {
            self.render_preview(shape, units_per_pixel, projector, &painter);
        }

        // A poisoned lock only means a previous frame panicked mid-write
        let mut feedback = match self.feedback.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        feedback.events.extend(events);
        feedback.extent = Some(extent);
        feedback.units_per_pixel = units_per_pixel;
    }
}

fn render_polygon(
    polygon: &Polygon<f64>,
    projector: &Projector,
    painter: &egui::Painter,
    fill: Color32,
    stroke: Stroke,
) {
    // Triangulate in screen space so concave shapes and holes fill correctly
    let screen = polygon.map_coords(|c| {
        let p = to_screen(projector, c);
        Coord {
            x: f64::from(p.x),
            y: f64::from(p.y),
        }
    });

    if fill.a() > 0 {
        let mut mesh = egui::Mesh::default();
        for triangle in screen.earcut_triangles() {
            let base = mesh.vertices.len() as u32;
            for c in triangle.to_array() {
                mesh.colored_vertex(Pos2::new(c.x as f32, c.y as f32), fill);
            }
            mesh.add_triangle(base, base + 1, base + 2);
        }
        painter.add(egui::Shape::mesh(mesh));
    }

    for ring in std::iter::once(screen.exterior()).chain(screen.interiors()) {
        let points: Vec<Pos2> = ring
            .coords()
            .map(|c| Pos2::new(c.x as f32, c.y as f32))
            .collect();
        if points.len() >= 3 {
            painter.add(egui::Shape::closed_line(points, stroke));
        }
    }
}

fn project_line(line: &LineString<f64>, projector: &Projector) -> Vec<Pos2> {
    line.coords().map(|c| to_screen(projector, *c)).collect()
}

/// Display units to screen position
/// Press at the original press position, then catch up to the pointer
fn drag_start_events(origin: Option<Coord<f64>>, at: Coord<f64>) -> Vec<PointerEvent> {
    match origin {
        Some(origin) if origin != at => vec![
            PointerEvent::Press { at: origin },
            PointerEvent::Move { at },
        ],
        _ => vec![PointerEvent::Press { at }],
    }
}

fn to_screen(projector: &Projector, coord: Coord<f64>) -> Pos2 {
    let (lat, lon) = utils::mercator_to_wgs84(coord.x, coord.y);
    let screen = projector.project(walkers::lat_lon(lat, lon));
    Pos2::new(screen.x, screen.y)
}

/// Screen position to display units
fn to_display(projector: &Projector, pos: Pos2) -> Coord<f64> {
    let position = projector.unproject(pos.to_vec2());
    utils::wgs84_to_mercator(position.y(), position.x()).0
}

fn color32(color: Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.2} km", meters / 1000.0)
    } else {
        format!("{:.0} m", meters)
    }
}
