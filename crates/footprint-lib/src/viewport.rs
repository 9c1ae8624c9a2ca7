//! ViewportTracker - the "records currently in view" set
//!
//! Recomputed only when map movement settles (and once for the initial extent),
//! never on every animation frame.

use crate::{FeatureIndex, RecordId, utils};

use geo::Rect;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct ViewportTracker {
    extent: Option<Rect<f64>>,
    in_view: BTreeSet<RecordId>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ViewportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids whose feature extent overlaps `extent` (closed intervals), ascending
    pub fn intersecting(index: &FeatureIndex, extent: &Rect<f64>) -> Vec<RecordId> {
        index
            .all()
            .filter(|feature| utils::rects_intersect(&feature.extent(), extent))
            .map(|feature| feature.id)
            .collect()
    }

    /// Store a settled extent and recompute the in-view set
    pub fn on_settled(&mut self, extent: Rect<f64>, index: &FeatureIndex) {
        self.extent = Some(extent);
        self.refresh(index);
    }

    /// Recompute against the stored extent, e.g. after the records changed
    pub fn refresh(&mut self, index: &FeatureIndex) {
        #[cfg(feature = "profiling")]
        profiling::scope!("viewport::refresh");

        let Some(extent) = self.extent else {
            // Before the first settle nothing is considered in view
            self.in_view.clear();
            return;
        };

        self.in_view = Self::intersecting(index, &extent).into_iter().collect();
        tracing::trace!(
            in_view = self.in_view.len(),
            total = index.len(),
            "Viewport recomputed"
        );
    }

    #[inline]
    pub fn extent(&self) -> Option<Rect<f64>> {
        self.extent
    }

    #[inline]
    pub fn in_view(&self, id: RecordId) -> bool {
        self.in_view.contains(&id)
    }

    /// In-view ids, ascending
    #[inline]
    pub fn in_view_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.in_view.iter().copied()
    }

    #[inline]
    pub fn in_view_count(&self) -> usize {
        self.in_view.len()
    }

    /// In-view ids plus the selected ids that still have a feature, deduplicated
    pub fn render_set(
        &self,
        index: &FeatureIndex,
        selected: impl IntoIterator<Item = RecordId>,
    ) -> BTreeSet<RecordId> {
        let mut set = self.in_view.clone();
        set.extend(selected.into_iter().filter(|id| index.contains(*id)));
        set
    }
}
