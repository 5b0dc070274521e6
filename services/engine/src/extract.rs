//! Metrics extraction - every derived dashboard view off one record set
//!
//! Responsibilities:
//! - Headline counts (total/open/closed) with explicit deduplication
//! - Percentage metrics: SLA adherence, escalation rate, resolution rate
//! - Ranked breakdowns (category, source, zone), risk hotspots, heatmap
//! - 30-day trend series and inferred master-data dimensions
//!
//! Two counting semantics exist side by side and are kept named: unique
//! ticket counts (business headline numbers) and raw record counts
//! (volume views). Ticket identifiers repeat across rows, so every
//! unique-based view deduplicates explicitly, always AFTER the campaign
//! exclusion filter - the filter-then-dedup order is contractual.
//!
//! Extraction never fails for a malformed row; the row is excluded from
//! the specific aggregate it cannot serve and still counts elsewhere.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::enrich::{
    dimension_key, infer_brand, infer_brewery, BreweryDim, OutletDim, ProductDim,
    FALLBACK_DIMENSION,
};
use crate::record::InteractionRecord;
use crate::validate::{validate, ValidationReport};

/// Campaign tag for third-party logistics traffic. Not attributable to
/// product quality; removed before any headline metric is computed.
pub const LOGISTICS_CAMPAIGN: &str = "Third Party Logistics";

/// The two priority tiers that count as escalated.
pub const ELEVATED_PRIORITIES: &[&str] = &["High Risk", "Critical Risk"];

const CLOSED_STATUSES: &[&str] = &["Closed", "Resolved", "Completed"];

const TREND_DAYS: i64 = 30;
const TOP_CATEGORIES: usize = 5;
const TOP_SOURCES: usize = 5;
const TOP_ZONES: usize = 8;
const TOP_HOTSPOTS: usize = 8;
const TOP_HEATMAP_CELLS: usize = 8;

// ============================================================================
// Output types (the read-only view model)
// ============================================================================

/// Which counting semantics a breakdown entry uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CountBasis {
    UniqueTickets,
    RawRecords,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownEntry {
    pub label: String,
    pub count: usize,
    /// Share of the group total (pre-truncation), not of the grand total.
    pub share_pct: f64,
    pub basis: CountBasis,
}

/// Severity ordering: `Critical` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskTier {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskHotspot {
    pub department: String,
    pub sub_category: String,
    pub record_count: usize,
    pub tier: RiskTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub brand: String,
    pub brewery: String,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    /// Distinct tickets created this day (campaign-excluded).
    pub created_unique: usize,
    /// Records closed this day.
    pub closed_records: usize,
    /// Records created this day carrying an elevated priority.
    pub escalated_records: usize,
}

/// The derived, read-only output consumed by presentation and export
/// layers. Computed on demand from the cached records; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub record_count: usize,
    pub total_complaints: usize,
    pub open_complaints: usize,
    pub closed_complaints: usize,
    pub escalated_records: usize,
    pub sla_adherence_pct: f64,
    pub escalation_rate_pct: f64,
    pub resolution_rate_pct: f64,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub category_breakdown: Vec<BreakdownEntry>,
    pub source_breakdown: Vec<BreakdownEntry>,
    pub zone_breakdown: Vec<BreakdownEntry>,
    pub risk_hotspots: Vec<RiskHotspot>,
    pub heatmap: Vec<HeatmapCell>,
    pub trend: Vec<TrendPoint>,
    pub products: Vec<ProductDim>,
    pub breweries: Vec<BreweryDim>,
    pub outlets: Vec<OutletDim>,
    pub validation: ValidationReport,
}

// ============================================================================
// Extractor
// ============================================================================

/// Pure, re-entrant view computation over an immutable record slice.
///
/// The reference date anchors the 30-day trend window; inject it for
/// reproducible output, or use `new` for today's UTC date.
pub struct MetricsExtractor<'a> {
    records: &'a [InteractionRecord],
    today: NaiveDate,
}

pub fn is_elevated_priority(record: &InteractionRecord) -> bool {
    record
        .priority
        .as_deref()
        .map(|p| ELEVATED_PRIORITIES.iter().any(|e| p.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn is_closed(record: &InteractionRecord) -> bool {
    record
        .status
        .as_deref()
        .map(|s| CLOSED_STATUSES.iter().any(|c| s.eq_ignore_ascii_case(c)))
        .unwrap_or(false)
}

/// Four-level tier with fixed precedence: critical urgency overrides
/// every priority-based tier.
pub fn risk_tier(record: &InteractionRecord) -> RiskTier {
    let urgency = record.urgency.as_deref().unwrap_or("");
    let priority = record.priority.as_deref().unwrap_or("");
    if urgency.eq_ignore_ascii_case("Critical") || priority.eq_ignore_ascii_case("Critical Risk") {
        RiskTier::Critical
    } else if priority.eq_ignore_ascii_case("High Risk") || urgency.eq_ignore_ascii_case("High") {
        RiskTier::High
    } else if priority.eq_ignore_ascii_case("Medium Risk") || urgency.eq_ignore_ascii_case("Medium")
    {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

fn meets_hotspot_threshold(record: &InteractionRecord) -> bool {
    let urgency = record.urgency.as_deref().unwrap_or("");
    is_elevated_priority(record)
        || urgency.eq_ignore_ascii_case("Critical")
        || urgency.eq_ignore_ascii_case("High")
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

impl<'a> MetricsExtractor<'a> {
    pub fn new(records: &'a [InteractionRecord]) -> Self {
        Self::with_reference_date(records, Utc::now().date_naive())
    }

    pub fn with_reference_date(records: &'a [InteractionRecord], today: NaiveDate) -> Self {
        Self { records, today }
    }

    /// Records left after the campaign exclusion. Every metric starts here.
    fn filtered(&self) -> impl Iterator<Item = &'a InteractionRecord> + '_ {
        self.records
            .iter()
            .filter(|r| r.campaign.as_deref() != Some(LOGISTICS_CAMPAIGN))
    }

    fn unique_tickets(&self) -> BTreeSet<&'a str> {
        self.filtered()
            .filter_map(|r| r.ticket_id.as_deref())
            .collect()
    }

    // ------------------------------------------------------------------------
    // Headline counts
    // ------------------------------------------------------------------------

    /// Distinct ticket identifiers after the campaign exclusion. Filter
    /// first, dedup second: a ticket whose only rows are excluded-campaign
    /// rows does not count at all.
    pub fn total_complaints(&self) -> usize {
        self.unique_tickets().len()
    }

    /// Distinct tickets with at least one record in a closed status.
    pub fn closed_complaints(&self) -> usize {
        self.filtered()
            .filter(|r| is_closed(r))
            .filter_map(|r| r.ticket_id.as_deref())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn open_complaints(&self) -> usize {
        self.total_complaints() - self.closed_complaints()
    }

    /// Record-based: this is also the escalation-rate numerator.
    pub fn escalated_records(&self) -> usize {
        self.filtered().filter(|r| is_elevated_priority(r)).count()
    }

    // ------------------------------------------------------------------------
    // Percentage metrics
    // ------------------------------------------------------------------------

    /// Among records carrying BOTH a parseable creation and response
    /// timestamp, the share where the response is strictly later. Records
    /// missing either timestamp leave numerator and denominator alike.
    pub fn sla_adherence_pct(&self) -> f64 {
        let mut met = 0usize;
        let mut basis = 0usize;
        for record in self.filtered() {
            let (Some(created), Some(responded)) = (record.created(), record.responded()) else {
                continue;
            };
            basis += 1;
            if responded > created {
                met += 1;
            }
        }
        share(met, basis)
    }

    /// Elevated-priority RECORD count over the UNIQUE complaint total.
    /// The asymmetric pairing is deliberate and preserved: duplicate rows
    /// of one escalated ticket push the rate past 100%.
    pub fn escalation_rate_pct(&self) -> f64 {
        share(self.escalated_records(), self.total_complaints())
    }

    pub fn resolution_rate_pct(&self) -> f64 {
        share(self.closed_complaints(), self.total_complaints())
    }

    // ------------------------------------------------------------------------
    // Breakdowns
    // ------------------------------------------------------------------------

    fn breakdown_by_unique<F>(&self, key: F, cap: usize) -> Vec<BreakdownEntry>
    where
        F: Fn(&InteractionRecord) -> Option<&str>,
    {
        let mut groups: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        for record in self.filtered() {
            let (Some(label), Some(ticket)) = (key(record), record.ticket_id.as_deref()) else {
                continue;
            };
            groups.entry(label.to_string()).or_default().insert(ticket);
        }
        let total: usize = groups.values().map(BTreeSet::len).sum();
        let mut entries: Vec<BreakdownEntry> = groups
            .into_iter()
            .map(|(label, tickets)| BreakdownEntry {
                label,
                count: tickets.len(),
                share_pct: share(tickets.len(), total),
                basis: CountBasis::UniqueTickets,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        entries.truncate(cap);
        entries
    }

    fn breakdown_by_records<F>(&self, key: F, cap: usize) -> Vec<BreakdownEntry>
    where
        F: Fn(&InteractionRecord) -> Option<&str>,
    {
        let mut groups: BTreeMap<String, usize> = BTreeMap::new();
        for record in self.filtered() {
            let Some(label) = key(record) else { continue };
            *groups.entry(label.to_string()).or_default() += 1;
        }
        let total: usize = groups.values().sum();
        let mut entries: Vec<BreakdownEntry> = groups
            .into_iter()
            .map(|(label, count)| BreakdownEntry {
                label,
                count,
                share_pct: share(count, total),
                basis: CountBasis::RawRecords,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        entries.truncate(cap);
        entries
    }

    pub fn category_breakdown(&self) -> Vec<BreakdownEntry> {
        self.breakdown_by_unique(|r| r.category.as_deref(), TOP_CATEGORIES)
    }

    /// Raw volume per source channel: documented as record-based.
    pub fn source_breakdown(&self) -> Vec<BreakdownEntry> {
        self.breakdown_by_records(|r| r.source_channel.as_deref(), TOP_SOURCES)
    }

    /// Zone is the reported city; record-based like the source view.
    pub fn zone_breakdown(&self) -> Vec<BreakdownEntry> {
        self.breakdown_by_records(|r| r.city.as_deref(), TOP_ZONES)
    }

    // ------------------------------------------------------------------------
    // Risk hotspots
    // ------------------------------------------------------------------------

    /// (department x sub-category) groups over records meeting the
    /// urgency/priority threshold, tagged with the most severe member
    /// tier, ranked by volume.
    pub fn risk_hotspots(&self) -> Vec<RiskHotspot> {
        let mut groups: BTreeMap<(String, String), (usize, RiskTier)> = BTreeMap::new();
        for record in self.filtered() {
            if !meets_hotspot_threshold(record) {
                continue;
            }
            let department = record
                .department
                .clone()
                .unwrap_or_else(|| FALLBACK_DIMENSION.to_string());
            let sub_category = record
                .sub_category
                .clone()
                .unwrap_or_else(|| FALLBACK_DIMENSION.to_string());
            let tier = risk_tier(record);
            let entry = groups
                .entry((department, sub_category))
                .or_insert((0, RiskTier::Low));
            entry.0 += 1;
            entry.1 = entry.1.min(tier);
        }
        let mut hotspots: Vec<RiskHotspot> = groups
            .into_iter()
            .map(|((department, sub_category), (record_count, tier))| RiskHotspot {
                department,
                sub_category,
                record_count,
                tier,
            })
            .collect();
        hotspots.sort_by(|a, b| {
            b.record_count
                .cmp(&a.record_count)
                .then_with(|| a.department.cmp(&b.department))
                .then_with(|| a.sub_category.cmp(&b.sub_category))
        });
        hotspots.truncate(TOP_HOTSPOTS);
        hotspots
    }

    // ------------------------------------------------------------------------
    // Trend
    // ------------------------------------------------------------------------

    /// The trailing 30 calendar days, reference date inclusive. Creation
    /// dates that fail to parse or sit more than 1 day in the future are
    /// noise for this view only; the record still counts elsewhere.
    pub fn trend(&self) -> Vec<TrendPoint> {
        let start = self.today - Duration::days(TREND_DAYS - 1);
        let horizon = self.today + Duration::days(1);

        let mut created: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
        let mut closed: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        let mut escalated: BTreeMap<NaiveDate, usize> = BTreeMap::new();

        for record in self.filtered() {
            if let Some(created_at) = record.created() {
                let day = created_at.date();
                if day <= horizon && day >= start && day <= self.today {
                    if let Some(ticket) = record.ticket_id.as_deref() {
                        created.entry(day).or_default().insert(ticket);
                    }
                    if is_elevated_priority(record) {
                        *escalated.entry(day).or_default() += 1;
                    }
                }
            }
            if let Some(closed_at) = record.closed() {
                let day = closed_at.date();
                if day >= start && day <= self.today {
                    *closed.entry(day).or_default() += 1;
                }
            }
        }

        (0..TREND_DAYS)
            .map(|offset| {
                let date = start + Duration::days(offset);
                TrendPoint {
                    date,
                    created_unique: created.get(&date).map(BTreeSet::len).unwrap_or(0),
                    closed_records: closed.get(&date).copied().unwrap_or(0),
                    escalated_records: escalated.get(&date).copied().unwrap_or(0),
                }
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Heatmap and master data
    // ------------------------------------------------------------------------

    pub fn heatmap(&self) -> Vec<HeatmapCell> {
        let mut cells: BTreeMap<(&'static str, &'static str), usize> = BTreeMap::new();
        for record in self.filtered() {
            let brand = infer_brand(record.brand.as_deref());
            let brewery = infer_brewery(record.branch.as_deref());
            *cells.entry((brand, brewery)).or_default() += 1;
        }
        let mut out: Vec<HeatmapCell> = cells
            .into_iter()
            .map(|((brand, brewery), record_count)| HeatmapCell {
                brand: brand.to_string(),
                brewery: brewery.to_string(),
                record_count,
            })
            .collect();
        out.sort_by(|a, b| {
            b.record_count
                .cmp(&a.record_count)
                .then_with(|| a.brand.cmp(&b.brand))
                .then_with(|| a.brewery.cmp(&b.brewery))
        });
        out.truncate(TOP_HEATMAP_CELLS);
        out
    }

    pub fn products(&self) -> Vec<ProductDim> {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for record in self.filtered() {
            *counts.entry(infer_brand(record.brand.as_deref())).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(name, record_count)| ProductDim {
                key: dimension_key(name),
                name: name.to_string(),
                record_count,
            })
            .collect()
    }

    pub fn breweries(&self) -> Vec<BreweryDim> {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for record in self.filtered() {
            *counts
                .entry(infer_brewery(record.branch.as_deref()))
                .or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(name, record_count)| BreweryDim {
                key: dimension_key(name),
                name: name.to_string(),
                record_count,
            })
            .collect()
    }

    /// Outlets come straight from the outlet field; records without one
    /// stay out of this collection.
    pub fn outlets(&self) -> Vec<OutletDim> {
        let mut outlets: BTreeMap<String, (Option<String>, usize)> = BTreeMap::new();
        for record in self.filtered() {
            let Some(name) = record.outlet.as_deref() else {
                continue;
            };
            let entry = outlets.entry(name.to_string()).or_insert((None, 0));
            entry.1 += 1;
            if entry.0.is_none() {
                entry.0 = record.city.clone();
            }
        }
        outlets
            .into_iter()
            .map(|(name, (city, record_count))| OutletDim {
                key: dimension_key(&name),
                name,
                city,
                record_count,
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Date range and snapshot assembly
    // ------------------------------------------------------------------------

    /// Min/max creation date over all records, far-future noise excluded.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let horizon = self.today + Duration::days(1);
        let mut range: Option<(NaiveDate, NaiveDate)> = None;
        for record in self.records {
            let Some(created) = record.created() else {
                continue;
            };
            let day = created.date();
            if day > horizon {
                continue;
            }
            range = Some(match range {
                None => (day, day),
                Some((min, max)) => (min.min(day), max.max(day)),
            });
        }
        range
    }

    /// Assemble the full read-only snapshot, validation verdict included.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot {
            record_count: self.records.len(),
            total_complaints: self.total_complaints(),
            open_complaints: self.open_complaints(),
            closed_complaints: self.closed_complaints(),
            escalated_records: self.escalated_records(),
            sla_adherence_pct: self.sla_adherence_pct(),
            escalation_rate_pct: self.escalation_rate_pct(),
            resolution_rate_pct: self.resolution_rate_pct(),
            date_range: self.date_range(),
            category_breakdown: self.category_breakdown(),
            source_breakdown: self.source_breakdown(),
            zone_breakdown: self.zone_breakdown(),
            risk_hotspots: self.risk_hotspots(),
            heatmap: self.heatmap(),
            trend: self.trend(),
            products: self.products(),
            breweries: self.breweries(),
            outlets: self.outlets(),
            validation: ValidationReport::default(),
        };
        snapshot.validation = validate(&snapshot);
        snapshot
    }
}

// =============================================================================
// TESTS
// =============================================================================
