//! Spatial queries over the feature index
//!
//! All queries are read-only and return record ids in ascending order. Inputs are
//! in display units except radii, which are great-circle meters.

use crate::{DrawShape, Feature, FeatureIndex, RecordId, ViewportTracker, utils};

use geo::{Coord, Point, Rect};

/// Slack applied to radius comparisons so a point exactly on the circle is kept
/// despite projection round-off
const RADIUS_EPSILON_M: f64 = 1e-3;

/// Borrowing query facade over a [`FeatureIndex`]
#[derive(Clone, Copy)]
pub struct SpatialQueryEngine<'a> {
    index: &'a FeatureIndex,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<'a> SpatialQueryEngine<'a> {
    pub fn new(index: &'a FeatureIndex) -> Self {
        Self { index }
    }

    /// Run the query described by a completed draw
    pub fn run(&self, shape: &DrawShape) -> Vec<RecordId> {
        match *shape {
            DrawShape::Box { p1, p2 } => self.box_query(p1, p2),
            DrawShape::Radius { center, radius_m } => self.radius_query(center, radius_m),
        }
    }

    /// Features inside the rectangle spanned by `p1` and `p2`
    ///
    /// Points must lie inside. Lines and polygons match when their extent
    /// overlaps the rectangle, which over-selects shapes whose box touches the
    /// selection but whose outline does not.
    pub fn box_query(&self, p1: Coord<f64>, p2: Coord<f64>) -> Vec<RecordId> {
        #[cfg(feature = "profiling")]
        profiling::scope!("query::box");

        if self.is_empty_index("box") {
            return Vec::new();
        }

        let rect = utils::rect_from_corners(p1, p2);
        let hits: Vec<RecordId> = self
            .index
            .all()
            .filter(|feature| match feature.geometry.as_point() {
                Some(p) => utils::rect_contains(&rect, p.0),
                None => utils::rects_intersect(&feature.extent(), &rect),
            })
            .map(|feature| feature.id)
            .collect();

        tracing::debug!(hits = hits.len(), "Box query");
        hits
    }

    /// Features within `radius_m` meters of `center`
    ///
    /// Points match on haversine distance. Other shapes match when their closest
    /// point is within the radius or when they contain the center.
    pub fn radius_query(&self, center: Coord<f64>, radius_m: f64) -> Vec<RecordId> {
        #[cfg(feature = "profiling")]
        profiling::scope!("query::radius");

        if self.is_empty_index("radius") {
            return Vec::new();
        }

        let center_geo = utils::mercator_to_lon_lat(center);
        let within = |p: Point<f64>| {
            utils::haversine_distance(center_geo, utils::mercator_to_lon_lat(p.0))
                <= radius_m + RADIUS_EPSILON_M
        };

        let hits: Vec<RecordId> = self
            .index
            .all()
            .filter(|feature| {
                let geometry = &feature.geometry;
                match geometry.as_point() {
                    Some(p) => within(p),
                    None => {
                        geometry.contains(center)
                            || geometry.closest_point(center).is_some_and(within)
                    }
                }
            })
            .map(|feature| feature.id)
            .collect();

        tracing::debug!(radius_m, hits = hits.len(), "Radius query");
        hits
    }

    /// Topmost feature within `tolerance` display units of `at`
    ///
    /// `draw_order` lists ids back to front; later entries win.
    pub fn point_query(
        &self,
        at: Coord<f64>,
        tolerance: f64,
        draw_order: &[RecordId],
    ) -> Option<RecordId> {
        self.point_query_with(at, draw_order, |_| tolerance)
    }

    /// Like [`SpatialQueryEngine::point_query`], with a tolerance per feature
    ///
    /// Lets markers drawn larger than the base hit radius be hit anywhere they
    /// are painted.
    pub fn point_query_with(
        &self,
        at: Coord<f64>,
        draw_order: &[RecordId],
        tolerance_of: impl Fn(&Feature) -> f64,
    ) -> Option<RecordId> {
        #[cfg(feature = "profiling")]
        profiling::scope!("query::point");

        if self.is_empty_index("point") {
            return None;
        }

        draw_order.iter().rev().copied().find(|id| {
            self.index.get(*id).is_some_and(|feature| {
                let tolerance = tolerance_of(feature);
                utils::rects_intersect(&feature.extent(), &probe_rect(at, tolerance))
                    && feature.geometry.distance_to(at) <= tolerance
            })
        })
    }

    /// Features whose extent intersects the viewport
    pub fn viewport_query(&self, extent: &Rect<f64>) -> Vec<RecordId> {
        if self.is_empty_index("viewport") {
            return Vec::new();
        }
        ViewportTracker::intersecting(self.index, extent)
    }

    fn is_empty_index(&self, kind: &str) -> bool {
        let empty = self.index.is_empty();
        if empty {
            tracing::debug!(kind, "Query on empty index");
        }
        empty
    }
}

fn probe_rect(at: Coord<f64>, tolerance: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: at.x - tolerance,
            y: at.y - tolerance,
        },
        Coord {
            x: at.x + tolerance,
            y: at.y + tolerance,
        },
    )
}
