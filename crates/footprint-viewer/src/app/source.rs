//! Record sources
//!
//! A source hands back the full record list for a search query. Fetches run on
//! the tokio runtime; the app polls the result once per frame.

use footprint_lib::{Record, RecordId};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed records document: {0}")]
    Format(String),
}

/// Parameters of one fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// Free-text filter; empty matches everything
    pub search: String,
}

impl RecordQuery {
    pub fn new(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
        }
    }
}

pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<Record>, SourceError>> + Send>>;

/// Anything that can produce the current record list
pub trait RecordSource: Send + Sync {
    /// Fetch every record matching `query`
    fn fetch(&self, query: RecordQuery) -> FetchFuture;

    /// Short human-readable name, shown in the sidebar
    fn describe(&self) -> String;
}

/// Records stored in a local JSON document
///
/// Accepts a bare array of records or an object wrapping one under `records`
/// or `data`. The file is re-read on every fetch so edits show up on refetch.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for JsonFileSource {
    fn fetch(&self, query: RecordQuery) -> FetchFuture {
        let path = self.path.clone();
        Box::pin(async move {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| SourceError::Io {
                    path: path.clone(),
                    source,
                })?;
            let records = parse_records(&bytes)?;
            let total = records.len();
            let matching = filter_records(records, &query);
            tracing::debug!(
                path = %path.display(),
                total,
                matching = matching.len(),
                search = %query.search,
                "Records fetched"
            );
            Ok(matching)
        })
    }

    fn describe(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Decode a records document, skipping entries that are not valid records
///
/// Later duplicates of an id are dropped so ids stay unique.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<Record>, SourceError> {
    let document: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| SourceError::Format(e.to_string()))?;

    let items = match document {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => {
            match map.remove("records").or_else(|| map.remove("data")) {
                Some(serde_json::Value::Array(items)) => items,
                _ => {
                    return Err(SourceError::Format(
                        "expected an array or an object with a \"records\" array".to_string(),
                    ));
                }
            }
        }
        _ => {
            return Err(SourceError::Format(
                "expected an array or an object with a \"records\" array".to_string(),
            ));
        }
    };

    let mut seen: HashSet<RecordId> = HashSet::with_capacity(items.len());
    let mut records = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Record>(item) {
            Ok(record) => {
                if seen.insert(record.id) {
                    records.push(record);
                } else {
                    tracing::warn!(record_id = record.id, position, "Duplicate record id skipped");
                }
            }
            Err(error) => {
                tracing::warn!(position, %error, "Malformed record skipped");
            }
        }
    }
    Ok(records)
}

/// Keep the records matching the query's search text
pub fn filter_records(records: Vec<Record>, query: &RecordQuery) -> Vec<Record> {
    let needle = query.search.trim();
    if needle.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|record| record.matches_search(needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"[
        {"id": 1, "geometry": "SRID=4326;POINT (-0.1276 51.5072)", "status": "pending", "priority": "high", "name": "Westminster"},
        {"id": 2, "geom": "SRID=4326;POINT (2.3522 48.8566)", "status": "completed", "priority": "low", "site_id": "PAR-01"},
        {"id": "not-a-number"},
        {"id": 1, "geometry": "POINT (0 0)", "status": "review", "priority": "low"},
        {"id": 3, "status": "on_hold", "priority": "medium", "team": "North"}
    ]"#;

    #[test]
    fn test_parse_array_skips_bad_and_duplicate_entries() {
        let records = parse_records(DOCUMENT.as_bytes()).unwrap();
        let ids: Vec<RecordId> = records.iter().map(|r| r.id).collect();

        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(records[0].name.as_deref(), Some("Westminster"));
        // "geom" is accepted as an alias
        assert_eq!(
            records[1].geometry_str(),
            Some("SRID=4326;POINT (2.3522 48.8566)")
        );
        assert!(records[2].geometry_str().is_none());
    }

    #[test]
    fn test_parse_wrapped_documents() {
        let wrapped = r#"{"records": [{"id": 7, "geometry": "POINT (1 2)", "status": "pending", "priority": "low"}]}"#;
        assert_eq!(parse_records(wrapped.as_bytes()).unwrap().len(), 1);

        let data = r#"{"total": 1, "data": [{"id": 8, "status": "pending", "priority": "low"}]}"#;
        assert_eq!(parse_records(data.as_bytes()).unwrap()[0].id, 8);
    }

    #[test]
    fn test_parse_rejects_unexpected_shapes() {
        assert!(matches!(
            parse_records(br#"{"rows": []}"#),
            Err(SourceError::Format(_))
        ));
        assert!(matches!(parse_records(b"42"), Err(SourceError::Format(_))));
        assert!(matches!(
            parse_records(b"not json"),
            Err(SourceError::Format(_))
        ));
    }

    #[test]
    fn test_filter_records() {
        let records = parse_records(DOCUMENT.as_bytes()).unwrap();

        let all = filter_records(records.clone(), &RecordQuery::new("   "));
        assert_eq!(all.len(), 3);

        let paris = filter_records(records.clone(), &RecordQuery::new("par-01"));
        assert_eq!(paris.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);

        let none = filter_records(records, &RecordQuery::new("nowhere"));
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_json_file_source_fetch() {
        let path = std::env::temp_dir().join(format!(
            "footprint-source-{}-{}.json",
            std::process::id(),
            line!()
        ));
        tokio::fs::write(&path, DOCUMENT).await.unwrap();

        let source = JsonFileSource::new(&path);
        assert!(source.describe().starts_with("footprint-source-"));

        let records = source.fetch(RecordQuery::new("westminster")).await.unwrap();
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);

        tokio::fs::remove_file(&path).await.unwrap();
        let missing = source.fetch(RecordQuery::default()).await;
        assert!(matches!(missing, Err(SourceError::Io { .. })));
    }
}
