//! Snapshot cache - holds the current dataset, replaces it atomically
//!
//! Responsibilities:
//! - Decode acquired bytes (BOM-sniffed, lossy; exports arrive in mixed encodings)
//! - Parse + normalize into an immutable dataset with provenance
//! - Replace the held dataset atomically (readers see old or new, never a mix)
//! - Answer the "sufficient real data" predicate downstream views gate on
//!
//! The cache is an explicit, constructed object handed to consumers; there
//! is no process-wide instance. One writer replaces, any number of readers
//! share the current `Arc<Dataset>`.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::parser::parse;
use crate::record::{normalize, parse_flexible_date, InteractionRecord};

/// Downstream consumers fall back to synthetic metrics at or below this
/// record count.
pub const SUFFICIENT_REAL_DATA_THRESHOLD: usize = 50;

/// One parsed dataset: normalized records plus load provenance. Immutable
/// once constructed; a new load fully replaces it, never merges.
#[derive(Debug)]
pub struct Dataset {
    pub dataset_id: Uuid,
    pub source: String,
    pub content_hash: String,
    pub loaded_at: DateTime<Utc>,
    pub records: Vec<InteractionRecord>,
    pub blank_rows: usize,
    /// Skip reasons accumulated while loading. The permissive parse policy
    /// stays auditable through this list.
    pub warnings: Vec<String>,
}

/// Summary returned to the caller after a load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub dataset_id: Uuid,
    pub source: String,
    pub content_hash: String,
    pub records_loaded: usize,
    pub blank_rows_skipped: usize,
    pub warnings: Vec<String>,
}

/// Decode raw bytes into text: BOM sniffing picks UTF-8/UTF-16, anything
/// undecodable is replaced rather than failing the load.
pub fn decode_text(bytes: &[u8]) -> String {
    let (text, _encoding, _had_errors) = encoding_rs::UTF_8.decode(bytes);
    text.into_owned()
}

#[derive(Debug, Default)]
pub struct SnapshotCache {
    current: RwLock<Option<Arc<Dataset>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current dataset, shared. `None` until the first load.
    pub fn current(&self) -> Option<Arc<Dataset>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True when the held dataset has strictly more records than the
    /// threshold; downstream views use synthetic metrics otherwise.
    pub fn has_sufficient_real_data(&self) -> bool {
        self.current()
            .map(|d| d.records.len() > SUFFICIENT_REAL_DATA_THRESHOLD)
            .unwrap_or(false)
    }

    /// Parse text and replace the held dataset. Structural anomalies are
    /// absorbed by the parser; the previous dataset survives until the
    /// swap, so readers never observe a partial load.
    pub fn load_from_str(&self, text: &str, source: &str) -> LoadReport {
        let parsed = parse(text);
        let records: Vec<InteractionRecord> = parsed.records.iter().map(normalize).collect();

        let mut warnings = Vec::new();
        for (idx, record) in records.iter().enumerate() {
            if record.ticket_id.is_none() {
                warnings.push(format!("record {}: no ticket identifier", idx + 1));
            }
            if let Some(raw) = &record.created_at {
                if parse_flexible_date(raw).is_none() {
                    warnings.push(format!("record {}: unreadable creation date '{}'", idx + 1, raw));
                }
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let content_hash = format!("sha256:{:x}", hasher.finalize());

        let dataset = self.replace(Dataset {
            dataset_id: Uuid::new_v4(),
            source: source.to_string(),
            content_hash,
            loaded_at: Utc::now(),
            records,
            blank_rows: parsed.blank_rows,
            warnings,
        });

        LoadReport {
            dataset_id: dataset.dataset_id,
            source: dataset.source.clone(),
            content_hash: dataset.content_hash.clone(),
            records_loaded: dataset.records.len(),
            blank_rows_skipped: dataset.blank_rows,
            warnings: dataset.warnings.clone(),
        }
    }

    /// Decode first, then load. Entry point for file/network acquisition.
    pub fn load_from_bytes(&self, bytes: &[u8], source: &str) -> LoadReport {
        let text = decode_text(bytes);
        self.load_from_str(&text, source)
    }

    fn replace(&self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::clone(&dataset));
        dataset
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_with_rows(rows: usize) -> String {
        let mut text = String::from("Check,Status\n");
        for i in 0..rows {
            text.push_str(&format!("T{i},Open\n"));
        }
        text
    }

    // -------------------------------------------------------------------------
    // LOADING
    // -------------------------------------------------------------------------

    #[test]
    fn test_load_replaces_dataset() {
        let cache = SnapshotCache::new();
        assert!(cache.current().is_none());

        cache.load_from_str(&csv_with_rows(3), "first.csv");
        assert_eq!(cache.current().unwrap().records.len(), 3);

        cache.load_from_str(&csv_with_rows(1), "second.csv");
        let current = cache.current().unwrap();
        assert_eq!(current.records.len(), 1);
        assert_eq!(current.source, "second.csv");
    }

    #[test]
    fn test_load_empty_input_yields_empty_dataset() {
        let cache = SnapshotCache::new();
        let report = cache.load_from_str("", "empty.csv");
        assert_eq!(report.records_loaded, 0);
        assert!(!cache.has_sufficient_real_data());
        assert!(cache.current().is_some());
    }

    #[test]
    fn test_load_report_counts_and_hash() {
        let cache = SnapshotCache::new();
        let text = "Check,Status\nT1,Open\n\nT2,Open\n";
        let report = cache.load_from_str(text, "sample.csv");
        assert_eq!(report.records_loaded, 2);
        assert_eq!(report.blank_rows_skipped, 1);
        assert!(report.content_hash.starts_with("sha256:"));

        // Hash is a function of content alone.
        let again = cache.load_from_str(text, "sample.csv");
        assert_eq!(report.content_hash, again.content_hash);
    }

    #[test]
    fn test_load_warnings_accumulate() {
        let cache = SnapshotCache::new();
        let report = cache.load_from_str(
            "Check,Status,Date Created\n,Open,2025-06-10\nT2,Open,whenever\n",
            "sample.csv",
        );
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("no ticket identifier"));
        assert!(report.warnings[1].contains("unreadable creation date"));
    }

    // -------------------------------------------------------------------------
    // DECODING
    // -------------------------------------------------------------------------

    #[test]
    fn test_load_from_bytes_utf8_bom() {
        let cache = SnapshotCache::new();
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"Check,Status\nT1,Open\n");
        let report = cache.load_from_bytes(&bytes, "bom.csv");
        assert_eq!(report.records_loaded, 1);
        let record = &cache.current().unwrap().records[0];
        assert_eq!(record.ticket_id.as_deref(), Some("T1"));
    }

    #[test]
    fn test_decode_text_utf16le_bom() {
        let text = "Check,Status\nT1,Open\n";
        let mut bytes = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes), text);
    }

    // -------------------------------------------------------------------------
    // SUFFICIENCY PREDICATE
    // -------------------------------------------------------------------------

    #[test]
    fn test_sufficiency_threshold_is_strict() {
        let cache = SnapshotCache::new();
        cache.load_from_str(&csv_with_rows(SUFFICIENT_REAL_DATA_THRESHOLD), "at.csv");
        assert!(!cache.has_sufficient_real_data());

        cache.load_from_str(&csv_with_rows(SUFFICIENT_REAL_DATA_THRESHOLD + 1), "above.csv");
        assert!(cache.has_sufficient_real_data());
    }

    // -------------------------------------------------------------------------
    // ATOMIC REPLACEMENT
    // -------------------------------------------------------------------------

    #[test]
    fn test_readers_never_see_a_torn_snapshot() {
        let cache = Arc::new(SnapshotCache::new());
        cache.load_from_str(&csv_with_rows(10), "ten.csv");

        std::thread::scope(|scope| {
            let writer_cache = Arc::clone(&cache);
            scope.spawn(move || {
                for _ in 0..50 {
                    writer_cache.load_from_str(&csv_with_rows(10), "ten.csv");
                    writer_cache.load_from_str(&csv_with_rows(3), "three.csv");
                }
            });

            for _ in 0..4 {
                let reader_cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for _ in 0..200 {
                        let dataset = reader_cache.current().unwrap();
                        // Source and record count always belong together.
                        match dataset.source.as_str() {
                            "ten.csv" => assert_eq!(dataset.records.len(), 10),
                            "three.csv" => assert_eq!(dataset.records.len(), 3),
                            other => panic!("unexpected source {other}"),
                        }
                    }
                });
            }
        });
    }
}
