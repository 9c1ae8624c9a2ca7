//! SelectionSyncController - the single source of truth for "what is selected"
//!
//! The grid's checked rows, the map highlight and the "N selected" summary are
//! all projections of the id set held here. Every selection trigger (grid row,
//! multi-select click, box or radius query) goes through
//! [`SelectionSyncController::set_selection`], and listeners only ever see an
//! immutable [`SelectionChange`] snapshot, so no projection can write back into
//! the store while it is being notified.

use crate::{FeatureIndex, Record, RecordId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// What caused a selection change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SelectionSource {
    /// Row checkboxes in the records grid
    Grid,
    /// Multi-select click on a map feature
    MapClick,
    /// Select button in a feature's popup
    Popup,
    /// Completed box draw
    BoxQuery,
    /// Completed radius draw
    RadiusQuery,
    /// Host-initiated, e.g. a "clear selection" button
    Programmatic,
}

/// Snapshot delivered to listeners after the selection changed
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SelectionChange {
    /// Full selection after the change, ascending
    pub ids: Vec<RecordId>,
    pub added: Vec<RecordId>,
    pub removed: Vec<RecordId>,
    pub source: SelectionSource,
    pub revision: u64,
}

/// Handle returned by [`SelectionSyncController::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// How the selection shows up in each view for the current records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SelectionProjection {
    /// Rows checked in the grid (selected ids present in the records)
    pub grid_checked: BTreeSet<RecordId>,
    /// Features drawn highlighted (selected ids that have a feature)
    pub highlighted: BTreeSet<RecordId>,
    /// Selected ids absent from the current records
    pub stale: Vec<RecordId>,
    pub revision: u64,
}

impl SelectionProjection {
    /// Count shown in the "N selected" summary
    #[inline]
    pub fn selected_count(&self) -> usize {
        self.grid_checked.len()
    }
}

type Listener = Box<dyn FnMut(&SelectionChange)>;

/// Canonical selected-id store with explicit fan-out
#[derive(Default)]
pub struct SelectionSyncController {
    selected: BTreeSet<RecordId>,
    revision: u64,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl std::fmt::Debug for SelectionSyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionSyncController")
            .field("selected", &self.selected)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SelectionSyncController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener called after every effective change
    pub fn subscribe(&mut self, listener: impl FnMut(&SelectionChange) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was already gone
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Drop every listener (host teardown)
    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Replace the selection
    ///
    /// Ids unknown to the current records are stored as-is. Returns whether the
    /// set actually changed; unchanged sets notify nobody.
    pub fn set_selection(
        &mut self,
        ids: impl IntoIterator<Item = RecordId>,
        source: SelectionSource,
    ) -> bool {
        let next: BTreeSet<RecordId> = ids.into_iter().collect();
        if next == self.selected {
            tracing::trace!(?source, "Selection unchanged");
            return false;
        }

        let added: Vec<RecordId> = next.difference(&self.selected).copied().collect();
        let removed: Vec<RecordId> = self.selected.difference(&next).copied().collect();
        self.selected = next;
        self.revision += 1;

        tracing::debug!(
            ?source,
            selected = self.selected.len(),
            added = added.len(),
            removed = removed.len(),
            "Selection changed"
        );

        let change = SelectionChange {
            ids: self.selected.iter().copied().collect(),
            added,
            removed,
            source,
            revision: self.revision,
        };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&change);
        }
        true
    }

    /// Add or remove one id
    pub fn toggle(&mut self, id: RecordId, source: SelectionSource) -> bool {
        let mut next = self.selected.clone();
        if !next.remove(&id) {
            next.insert(id);
        }
        self.set_selection(next, source)
    }

    pub fn clear(&mut self, source: SelectionSource) -> bool {
        self.set_selection(std::iter::empty(), source)
    }

    #[inline]
    pub fn contains(&self, id: RecordId) -> bool {
        self.selected.contains(&id)
    }

    /// Selected ids, ascending
    #[inline]
    pub fn selection(&self) -> &BTreeSet<RecordId> {
        &self.selected
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Incremented on every effective change
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The records that are selected, in record order
    pub fn selected_records<'r>(&self, records: &'r [Record]) -> Vec<&'r Record> {
        records.iter().filter(|r| self.contains(r.id)).collect()
    }

    /// Derive every view's selection state from the current records and features
    pub fn projection(&self, records: &[Record], index: &FeatureIndex) -> SelectionProjection {
        let present: HashSet<RecordId> = records.iter().map(|r| r.id).collect();

        let grid_checked: BTreeSet<RecordId> = self
            .selected
            .iter()
            .copied()
            .filter(|id| present.contains(id))
            .collect();
        let stale: Vec<RecordId> = self
            .selected
            .iter()
            .copied()
            .filter(|id| !present.contains(id))
            .collect();
        let highlighted = grid_checked
            .iter()
            .copied()
            .filter(|id| index.contains(*id))
            .collect();

        if !stale.is_empty() {
            tracing::debug!(stale = stale.len(), "Selection holds ids missing from records");
        }

        SelectionProjection {
            grid_checked,
            highlighted,
            stale,
            revision: self.revision,
        }
    }
}
