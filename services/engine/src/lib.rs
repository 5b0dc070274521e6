//! Metrics Engine - Turns interaction-report CSV exports into dashboard metrics
//!
//! Responsibilities:
//! - Parse raw CSV text deterministically (hand-rolled RFC4180 state machine)
//! - Normalize raw rows into canonical interaction records
//! - Compute derived dashboard views (counts, SLA, escalations, trends, breakdowns)
//! - Infer master-data dimensions from weak string signals (best-effort)
//! - Validate the resulting summary and hold the current dataset in a cache
//!
//! CRITICAL: This engine must be DETERMINISTIC
//! Same CSV text + same reference date = same snapshot
//!
//! Parsing and extraction are maximally permissive: structural anomalies in
//! the source exports are absorbed locally and malformed rows are excluded
//! only from the specific aggregates they cannot serve. Validation is the
//! single place that renders a verdict on fitness for use.

pub mod cache;
pub mod enrich;
pub mod extract;
pub mod parser;
pub mod record;
pub mod validate;

pub use cache::{Dataset, LoadReport, SnapshotCache, SUFFICIENT_REAL_DATA_THRESHOLD};
pub use extract::{
    BreakdownEntry, CountBasis, HeatmapCell, MetricsExtractor, MetricsSnapshot, RiskHotspot,
    RiskTier, TrendPoint,
};
pub use parser::{parse, ParsedCsv};
pub use record::{normalize, parse_flexible_date, InteractionRecord};
pub use validate::{validate, ValidationReport};
