//! Record normalization - raw CSV rows into canonical interaction records
//!
//! Pure field mapping, absent values stay absent. Source column names churn
//! between exports, so every known field is matched through a short alias
//! list; everything unrecognized lands in the `extra` side-map instead of
//! being lost. No business logic lives here.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

// Known column aliases per canonical field. Matching is case-insensitive
// exact, in alias order: current exports use the first name, the rest were
// seen in older dumps.
const TICKET_COLUMNS: &[&str] = &["Check", "Ticket", "Ticket Id"];
const SOURCE_COLUMNS: &[&str] = &["Source", "Channel", "Source Channel"];
const CAMPAIGN_COLUMNS: &[&str] = &["Campaign", "Campaign Tag"];
const BRANCH_COLUMNS: &[&str] = &["Branch", "Brewery", "Branch Name"];
const DEPARTMENT_COLUMNS: &[&str] = &["Department", "Dept"];
const AGENT_COLUMNS: &[&str] = &["Agent", "Assigned Agent", "Owner"];
const COMPLEXITY_COLUMNS: &[&str] = &["Complexity", "Complexity Class"];
const STATUS_COLUMNS: &[&str] = &["Status", "Ticket Status"];
const CATEGORY_COLUMNS: &[&str] = &["Category", "Complaint Category"];
const SUB_CATEGORY_COLUMNS: &[&str] = &["Sub Category", "Subcategory", "Sub-Category"];
const PRIORITY_COLUMNS: &[&str] = &["Priority", "Risk", "Risk Priority"];
const URGENCY_COLUMNS: &[&str] = &["Urgency"];
const CREATED_COLUMNS: &[&str] = &["Date Created", "Created", "Creation Date"];
const MODIFIED_COLUMNS: &[&str] = &["Last Modified", "Date Modified", "Modified"];
const CLOSED_COLUMNS: &[&str] = &["Date Closed", "Closed Date", "Closure Date"];
const RESPONDED_COLUMNS: &[&str] = &["Date Responded", "First Response", "Response Date"];
const EXPECTED_RESPONSE_COLUMNS: &[&str] = &["Expected Response Time", "Expected Response (s)"];
const ACTUAL_RESPONSE_COLUMNS: &[&str] = &["Actual Response Time", "Actual Response (s)"];
const EXPECTED_RESOLUTION_COLUMNS: &[&str] = &["Expected Resolution Time", "Expected Resolution (s)"];
const ACTUAL_RESOLUTION_COLUMNS: &[&str] = &["Actual Resolution Time", "Actual Resolution (s)"];
const RESPONSE_ESCALATION_COLUMNS: &[&str] = &["Response Escalation", "Response Escalated"];
const RESOLUTION_ESCALATION_COLUMNS: &[&str] = &["Resolution Escalation", "Resolution Escalated"];
const CONSUMER_COLUMNS: &[&str] = &["Consumer", "Is Consumer", "Consumer Flag"];
const BATCH_COLUMNS: &[&str] = &["Batch Number", "Batch", "Batch No"];
const BRAND_COLUMNS: &[&str] = &["Brand", "SKU", "Brand / SKU"];
const CITY_COLUMNS: &[&str] = &["City", "Town"];
const OUTLET_COLUMNS: &[&str] = &["Outlet", "Outlet Name"];
const PACK_SIZE_COLUMNS: &[&str] = &["Pack Size", "Pack"];
const PHONE_COLUMNS: &[&str] = &["Phone", "Phone Number", "Mobile"];
const EMAIL_COLUMNS: &[&str] = &["Email", "E-mail"];

const ALL_KNOWN_COLUMNS: &[&[&str]] = &[
    TICKET_COLUMNS,
    SOURCE_COLUMNS,
    CAMPAIGN_COLUMNS,
    BRANCH_COLUMNS,
    DEPARTMENT_COLUMNS,
    AGENT_COLUMNS,
    COMPLEXITY_COLUMNS,
    STATUS_COLUMNS,
    CATEGORY_COLUMNS,
    SUB_CATEGORY_COLUMNS,
    PRIORITY_COLUMNS,
    URGENCY_COLUMNS,
    CREATED_COLUMNS,
    MODIFIED_COLUMNS,
    CLOSED_COLUMNS,
    RESPONDED_COLUMNS,
    EXPECTED_RESPONSE_COLUMNS,
    ACTUAL_RESPONSE_COLUMNS,
    EXPECTED_RESOLUTION_COLUMNS,
    ACTUAL_RESOLUTION_COLUMNS,
    RESPONSE_ESCALATION_COLUMNS,
    RESOLUTION_ESCALATION_COLUMNS,
    CONSUMER_COLUMNS,
    BATCH_COLUMNS,
    BRAND_COLUMNS,
    CITY_COLUMNS,
    OUTLET_COLUMNS,
    PACK_SIZE_COLUMNS,
    PHONE_COLUMNS,
    EMAIL_COLUMNS,
];

/// The canonical unit of business data. All attributes are semantically
/// optional; timestamps stay raw strings here and are parsed per metric,
/// so one bad date never drops a record from every aggregate at once.
///
/// Ticket identifiers are NOT unique across rows: multi-line descriptions
/// and duplicate exports produce repeats. Deduplication belongs to the
/// extraction layer, per view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionRecord {
    pub ticket_id: Option<String>,
    pub source_channel: Option<String>,
    pub campaign: Option<String>,
    pub branch: Option<String>,
    pub department: Option<String>,
    pub agent: Option<String>,
    pub complexity: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub priority: Option<String>,
    pub urgency: Option<String>,
    pub created_at: Option<String>,
    pub last_modified_at: Option<String>,
    pub closed_at: Option<String>,
    pub responded_at: Option<String>,
    pub expected_response_secs: Option<i64>,
    pub actual_response_secs: Option<i64>,
    pub expected_resolution_secs: Option<i64>,
    pub actual_resolution_secs: Option<i64>,
    pub response_escalated: Option<bool>,
    pub resolution_escalated: Option<bool>,
    pub is_consumer: Option<bool>,
    pub batch_number: Option<String>,
    pub brand: Option<String>,
    pub city: Option<String>,
    pub outlet: Option<String>,
    pub pack_size: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Columns present in the export but not recognized above. Preserved
    /// for forward compatibility; the extractor never reads them.
    pub extra: BTreeMap<String, String>,
}

impl InteractionRecord {
    pub fn created(&self) -> Option<NaiveDateTime> {
        self.created_at.as_deref().and_then(parse_flexible_date)
    }

    pub fn responded(&self) -> Option<NaiveDateTime> {
        self.responded_at.as_deref().and_then(parse_flexible_date)
    }

    pub fn closed(&self) -> Option<NaiveDateTime> {
        self.closed_at.as_deref().and_then(parse_flexible_date)
    }
}

/// Find the first known column with a non-empty value.
fn field(raw: &BTreeMap<String, String>, candidates: &[&str]) -> Option<String> {
    for candidate in candidates {
        for (name, value) in raw {
            if name.eq_ignore_ascii_case(candidate) {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Duration columns carry thousands separators in some exports.
fn seconds(raw: &BTreeMap<String, String>, candidates: &[&str]) -> Option<i64> {
    field(raw, candidates).and_then(|v| v.replace(',', "").parse().ok())
}

fn flag(raw: &BTreeMap<String, String>, candidates: &[&str]) -> Option<bool> {
    let value = field(raw, candidates)?;
    match value.to_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Some(true),
        "n" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn is_known_column(name: &str) -> bool {
    ALL_KNOWN_COLUMNS
        .iter()
        .any(|aliases| aliases.iter().any(|a| a.eq_ignore_ascii_case(name)))
}

/// Map a raw row into the canonical record. Never fails: absent or
/// malformed cells become `None` and stay out of the aggregates that
/// need them.
pub fn normalize(raw: &BTreeMap<String, String>) -> InteractionRecord {
    let extra: BTreeMap<String, String> = raw
        .iter()
        .filter(|(name, value)| !is_known_column(name) && !value.trim().is_empty())
        .map(|(name, value)| (name.clone(), value.trim().to_string()))
        .collect();

    InteractionRecord {
        ticket_id: field(raw, TICKET_COLUMNS),
        source_channel: field(raw, SOURCE_COLUMNS),
        campaign: field(raw, CAMPAIGN_COLUMNS),
        branch: field(raw, BRANCH_COLUMNS),
        department: field(raw, DEPARTMENT_COLUMNS),
        agent: field(raw, AGENT_COLUMNS),
        complexity: field(raw, COMPLEXITY_COLUMNS),
        status: field(raw, STATUS_COLUMNS),
        category: field(raw, CATEGORY_COLUMNS),
        sub_category: field(raw, SUB_CATEGORY_COLUMNS),
        priority: field(raw, PRIORITY_COLUMNS),
        urgency: field(raw, URGENCY_COLUMNS),
        created_at: field(raw, CREATED_COLUMNS),
        last_modified_at: field(raw, MODIFIED_COLUMNS),
        closed_at: field(raw, CLOSED_COLUMNS),
        responded_at: field(raw, RESPONDED_COLUMNS),
        expected_response_secs: seconds(raw, EXPECTED_RESPONSE_COLUMNS),
        actual_response_secs: seconds(raw, ACTUAL_RESPONSE_COLUMNS),
        expected_resolution_secs: seconds(raw, EXPECTED_RESOLUTION_COLUMNS),
        actual_resolution_secs: seconds(raw, ACTUAL_RESOLUTION_COLUMNS),
        response_escalated: flag(raw, RESPONSE_ESCALATION_COLUMNS),
        resolution_escalated: flag(raw, RESOLUTION_ESCALATION_COLUMNS),
        is_consumer: flag(raw, CONSUMER_COLUMNS),
        batch_number: field(raw, BATCH_COLUMNS),
        brand: field(raw, BRAND_COLUMNS),
        city: field(raw, CITY_COLUMNS),
        outlet: field(raw, OUTLET_COLUMNS),
        pack_size: field(raw, PACK_SIZE_COLUMNS),
        phone: field(raw, PHONE_COLUMNS),
        email: field(raw, EMAIL_COLUMNS),
        extra,
    }
}

// Formats actually seen in the exports, most common first.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Parse a timestamp in any of the formats the source mixes. Returns
/// `None` for anything unreadable; per-metric exclusion is the caller's
/// policy.
pub fn parse_flexible_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // -------------------------------------------------------------------------
    // FIELD MAPPING
    // -------------------------------------------------------------------------

    #[test]
    fn test_normalize_known_fields() {
        let record = normalize(&raw(&[
            ("Check", "T-1001"),
            ("Source", "Call Centre"),
            ("Status", "Open"),
            ("Priority", "High Risk"),
            ("Date Created", "2025-01-01 09:00:00"),
            ("City", "Lusaka"),
        ]));
        assert_eq!(record.ticket_id.as_deref(), Some("T-1001"));
        assert_eq!(record.source_channel.as_deref(), Some("Call Centre"));
        assert_eq!(record.status.as_deref(), Some("Open"));
        assert_eq!(record.priority.as_deref(), Some("High Risk"));
        assert_eq!(record.city.as_deref(), Some("Lusaka"));
    }

    #[test]
    fn test_normalize_aliases_case_insensitive() {
        let record = normalize(&raw(&[("ticket", "T-9"), ("BREWERY", "Northgate Brewery")]));
        assert_eq!(record.ticket_id.as_deref(), Some("T-9"));
        assert_eq!(record.branch.as_deref(), Some("Northgate Brewery"));
    }

    #[test]
    fn test_normalize_empty_values_become_none() {
        let record = normalize(&raw(&[("Check", "  "), ("Status", "")]));
        assert_eq!(record.ticket_id, None);
        assert_eq!(record.status, None);
    }

    #[test]
    fn test_normalize_trims_values() {
        let record = normalize(&raw(&[("Check", "  T-1  ")]));
        assert_eq!(record.ticket_id.as_deref(), Some("T-1"));
    }

    #[test]
    fn test_unrecognized_columns_kept_in_extra() {
        let record = normalize(&raw(&[
            ("Check", "T-1"),
            ("Warehouse Code", "WH-07"),
            ("Blank Extra", "  "),
        ]));
        assert_eq!(record.extra.get("Warehouse Code").map(String::as_str), Some("WH-07"));
        assert!(!record.extra.contains_key("Blank Extra"));
        assert!(!record.extra.contains_key("Check"));
    }

    // -------------------------------------------------------------------------
    // COERCIONS
    // -------------------------------------------------------------------------

    #[test]
    fn test_seconds_with_thousands_separator() {
        let record = normalize(&raw(&[("Actual Response Time", "86,400")]));
        assert_eq!(record.actual_response_secs, Some(86_400));
    }

    #[test]
    fn test_seconds_garbage_is_none() {
        let record = normalize(&raw(&[("Actual Response Time", "soon")]));
        assert_eq!(record.actual_response_secs, None);
    }

    #[test]
    fn test_flag_coercions() {
        let record = normalize(&raw(&[
            ("Response Escalation", "Yes"),
            ("Resolution Escalation", "0"),
            ("Consumer", "maybe"),
        ]));
        assert_eq!(record.response_escalated, Some(true));
        assert_eq!(record.resolution_escalated, Some(false));
        assert_eq!(record.is_consumer, None);
    }

    // -------------------------------------------------------------------------
    // DATE PARSING
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_flexible_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_flexible_date("2025-03-14"), Some(expected));
        assert_eq!(parse_flexible_date("14/03/2025"), Some(expected));
        assert_eq!(parse_flexible_date("14-03-2025"), Some(expected));
        assert_eq!(parse_flexible_date("2025/03/14"), Some(expected));
    }

    #[test]
    fn test_parse_flexible_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(8, 30, 15)
            .unwrap();
        assert_eq!(parse_flexible_date("2025-03-14 08:30:15"), Some(expected));
        assert_eq!(parse_flexible_date("2025-03-14T08:30:15"), Some(expected));
        assert_eq!(parse_flexible_date("14/03/2025 08:30:15"), Some(expected));
    }

    #[test]
    fn test_parse_flexible_date_noise_is_none() {
        assert_eq!(parse_flexible_date(""), None);
        assert_eq!(parse_flexible_date("yesterday"), None);
        assert_eq!(parse_flexible_date("31/31/2025"), None);
    }

    #[test]
    fn test_record_date_accessors() {
        let record = normalize(&raw(&[
            ("Date Created", "2025-01-01 09:00:00"),
            ("Date Closed", "not a date"),
        ]));
        assert!(record.created().is_some());
        assert!(record.closed().is_none());
    }
}
