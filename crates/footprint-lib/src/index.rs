//! FeatureIndex - renderable features keyed by record id
//!
//! Every record with a valid geometry gets a [`Feature`], regardless of whether it
//! is in view. Parsed geometry is cached by `(id, geometry string)` so a refetch
//! that returns the same rows does no parsing at all.

use crate::{GeometryCodec, ParsedGeometry, Priority, Record, RecordId, Status, utils};

use geo::Rect;
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A renderable feature tied to one record
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: RecordId,
    pub geometry: Arc<ParsedGeometry>,
    pub status: Status,
    pub priority: Priority,
    pub label: String,
}

impl Feature {
    /// Precomputed extent of the geometry
    #[inline]
    pub fn extent(&self) -> Rect<f64> {
        self.geometry.extent()
    }
}

/// Counters from the last rebuild
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexStats {
    /// Features currently indexed
    pub features: usize,
    /// Records whose geometry failed to parse
    pub invalid: usize,
    /// Records without a geometry string
    pub missing: usize,
    /// Geometries parsed during the rebuild (cache misses)
    pub parsed: usize,
    /// Geometries reused from the cache
    pub reused: usize,
}

/// One cache slot: the source text and what it parsed to
///
/// Failures are cached too, so a broken row is only reported once per change.
#[derive(Debug, Clone)]
struct CacheEntry {
    source: String,
    parsed: Option<Arc<ParsedGeometry>>,
}

/// Feature store rebuilt from the full record set
#[derive(Debug, Clone, Default)]
pub struct FeatureIndex {
    features: BTreeMap<RecordId, Feature>,
    cache: HashMap<RecordId, CacheEntry>,
    stats: IndexStats,
    bounds: Option<Rect<f64>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl FeatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the feature set with one derived from `records`
    ///
    /// Deterministic: the same records always yield the same features.
    pub fn rebuild(&mut self, records: &[Record]) -> IndexStats {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::rebuild");

        let mut stats = IndexStats::default();

        // Split into cache hits and the work that needs parsing
        let mut reused: Vec<(RecordId, Option<Arc<ParsedGeometry>>)> = Vec::new();
        let mut pending: Vec<(RecordId, &str)> = Vec::new();
        for record in records {
            let Some(source) = record.geometry_str() else {
                stats.missing += 1;
                continue;
            };
            match self.cache.get(&record.id) {
                Some(entry) if entry.source == source => {
                    reused.push((record.id, entry.parsed.clone()));
                }
                _ => pending.push((record.id, source)),
            }
        }
        stats.reused = reused.len();
        stats.parsed = pending.len();

        // Parse cache misses in parallel
        let parsed: Vec<(RecordId, &str, Option<Arc<ParsedGeometry>>)> = pending
            .into_par_iter()
            .map(|(id, source)| match GeometryCodec::parse(source) {
                Ok(geometry) => (id, source, Some(Arc::new(geometry))),
                Err(err) => {
                    tracing::warn!(record_id = id, error = %err, "Dropping record geometry");
                    (id, source, None)
                }
            })
            .collect();

        let mut cache: HashMap<RecordId, CacheEntry> = HashMap::with_capacity(records.len());
        for (id, parsed) in reused {
            if let Some(entry) = self.cache.remove(&id) {
                cache.insert(id, CacheEntry { parsed, ..entry });
            }
        }
        for (id, source, parsed) in parsed {
            cache.insert(
                id,
                CacheEntry {
                    source: source.to_string(),
                    parsed,
                },
            );
        }

        // Full replace, features follow the current record set only
        let mut features = BTreeMap::new();
        let mut bounds: Option<Rect<f64>> = None;
        for record in records {
            let Some(geometry) = cache.get(&record.id).and_then(|e| e.parsed.clone()) else {
                continue;
            };
            let extent = geometry.extent();
            bounds = Some(match bounds {
                Some(b) => utils::union_rect(&b, &extent),
                None => extent,
            });
            features.insert(
                record.id,
                Feature {
                    id: record.id,
                    geometry,
                    status: Status::parse(&record.status),
                    priority: Priority::parse(&record.priority),
                    label: record.label(),
                },
            );
        }

        stats.features = features.len();
        stats.invalid = records
            .iter()
            .filter(|r| r.geometry_str().is_some())
            .filter(|r| cache.get(&r.id).is_some_and(|e| e.parsed.is_none()))
            .count();

        self.features = features;
        self.cache = cache;
        self.bounds = bounds;
        self.stats = stats;

        tracing::debug!(
            features = stats.features,
            parsed = stats.parsed,
            reused = stats.reused,
            invalid = stats.invalid,
            "Feature index rebuilt"
        );

        stats
    }

    #[inline]
    pub fn get(&self, id: RecordId) -> Option<&Feature> {
        self.features.get(&id)
    }

    /// All features in ascending id order
    #[inline]
    pub fn all(&self) -> impl Iterator<Item = &Feature> + '_ {
        self.features.values()
    }

    #[inline]
    pub fn contains(&self, id: RecordId) -> bool {
        self.features.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Combined extent of every feature, `None` when empty
    #[inline]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    #[inline]
    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Drop all features and cached geometry
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<Record> {
        vec![
            Record::new(3, "POINT (3 3)").with_status("pending"),
            Record::new(1, "SRID=4326;POINT (1 1)").with_status("completed"),
            Record::new(2, "POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))").with_priority("high"),
        ]
    }

    #[test]
    fn test_rebuild_builds_features_in_id_order() {
        let mut index = FeatureIndex::new();
        let stats = index.rebuild(&records());

        assert_eq!(stats.features, 3);
        assert_eq!(stats.parsed, 3);
        assert_eq!(index.len(), 3);
        let ids: Vec<RecordId> = index.all().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(index.get(1).map(|f| f.status), Some(Status::Completed));
        assert_eq!(index.get(2).map(|f| f.priority), Some(Priority::High));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut index = FeatureIndex::new();
        index.rebuild(&records());
        let first: Vec<Feature> = index.all().cloned().collect();

        let stats = index.rebuild(&records());
        let second: Vec<Feature> = index.all().cloned().collect();

        assert_eq!(first, second);
        assert_eq!(stats.parsed, 0);
        assert_eq!(stats.reused, 3);
    }

    #[test]
    fn test_cache_reuses_arc_until_string_changes() {
        let mut index = FeatureIndex::new();
        index.rebuild(&records());
        let before = index.get(3).map(|f| f.geometry.clone()).unwrap();

        index.rebuild(&records());
        let same = index.get(3).map(|f| f.geometry.clone()).unwrap();
        assert!(Arc::ptr_eq(&before, &same));

        let mut changed = records();
        changed[0].geometry = Some("POINT (4 4)".to_string());
        index.rebuild(&changed);
        let after = index.get(3).map(|f| f.geometry.clone()).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_invalid_geometry_removes_stale_feature() {
        let mut index = FeatureIndex::new();
        index.rebuild(&records());
        assert!(index.contains(3));

        let mut broken = records();
        broken[0].geometry = Some("POINT (oops)".to_string());
        let stats = index.rebuild(&broken);

        assert!(!index.contains(3));
        assert_eq!(stats.invalid, 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_missing_geometry_is_skipped() {
        let mut index = FeatureIndex::new();
        let mut rows = records();
        rows.push(Record {
            id: 9,
            ..Default::default()
        });
        let stats = index.rebuild(&rows);
        assert_eq!(stats.missing, 1);
        assert!(!index.contains(9));
    }

    #[test]
    fn test_removed_records_drop_features() {
        let mut index = FeatureIndex::new();
        index.rebuild(&records());
        index.rebuild(&records()[..1]);
        assert_eq!(index.len(), 1);
        assert!(index.contains(3));
    }

    #[test]
    fn test_bounds_cover_all_features() {
        let mut index = FeatureIndex::new();
        assert!(index.bounds().is_none());

        index.rebuild(&records());
        let bounds = index.bounds().unwrap();
        for feature in index.all() {
            let extent = feature.extent();
            assert!(utils::rect_contains(&bounds, extent.min()));
            assert!(utils::rect_contains(&bounds, extent.max()));
        }
    }
}
