//! Record model shared with the record source
//!
//! A [`Record`] is one geocoded business entity (a product and its site footprint).
//! The engine treats records as read-only input that is replaced wholesale on each
//! fetch; only `id`, `geometry`, `status` and `priority` influence behavior, the
//! remaining attributes are carried through for labels, the grid and the popup.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable record identifier assigned by the backend
pub type RecordId = i64;

/// A geocoded record as delivered by the backend
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Record {
    /// Unique, stable identifier
    pub id: RecordId,
    /// Tagged WKT, optionally prefixed with `SRID=<n>;`
    #[cfg_attr(feature = "serde", serde(default, alias = "geom"))]
    pub geometry: Option<String>,
    /// Workflow status (free-form; unknown values get a default style)
    #[cfg_attr(feature = "serde", serde(default))]
    pub status: String,
    /// Priority tier (free-form; unknown values get a default marker size)
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub site_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub team: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub assignee: Option<String>,
}

impl Record {
    /// Create a record with just an id and a geometry string
    pub fn new(id: RecordId, geometry: impl Into<String>) -> Self {
        Self {
            id,
            geometry: Some(geometry.into()),
            ..Default::default()
        }
    }

    /// Builder-style status setter
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Builder-style priority setter
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Builder-style name setter
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Geometry string, if present and not blank
    #[inline]
    pub fn geometry_str(&self) -> Option<&str> {
        self.geometry
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }

    /// Text shown next to the feature on the map
    ///
    /// Prefers the site identifier, then the name, then `#<id>`.
    pub fn label(&self) -> String {
        self.site_id
            .as_deref()
            .or(self.name.as_deref())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", self.id))
    }

    /// Case-insensitive free-text match over the display attributes
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        if self.id.to_string() == needle {
            return true;
        }

        [
            Some(self.status.as_str()),
            Some(self.priority.as_str()),
            self.name.as_deref(),
            self.site_id.as_deref(),
            self.team.as_deref(),
            self.assignee.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}
