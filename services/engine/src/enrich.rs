//! Master-data inference - best-effort enrichment from weak string signals
//!
//! Products and breweries are not keyed in the source exports; they are
//! inferred by substring matches against short fixed vocabularies of known
//! brand and brewery names. This is best-effort enrichment with an explicit
//! fallback value, NOT authoritative mastering - consumers must treat the
//! inferred dimensions accordingly. Kept isolated here so a real
//! master-data join can replace it without touching the extraction core.

use serde::Serialize;

/// Known brand names matched as substrings of the free-text brand/SKU field.
pub const KNOWN_BRANDS: &[&str] = &[
    "Golden Peak",
    "Amber Crown",
    "River Stout",
    "Summit Lager",
    "Harbor Pils",
    "Old Mill",
];

/// Known brewery names matched as substrings of the branch name.
pub const KNOWN_BREWERIES: &[&str] = &[
    "Northgate Brewery",
    "Eastfield Brewery",
    "Southport Brewery",
    "Westbrook Brewery",
    "Central Brewery",
];

/// Fallback used whenever no vocabulary entry matches.
pub const FALLBACK_DIMENSION: &str = "Unspecified";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDim {
    pub key: String,
    pub name: String,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreweryDim {
    pub key: String,
    pub name: String,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutletDim {
    pub key: String,
    pub name: String,
    pub city: Option<String>,
    pub record_count: usize,
}

fn match_vocabulary(text: Option<&str>, vocabulary: &'static [&'static str]) -> &'static str {
    let text = match text {
        Some(t) => t.to_lowercase(),
        None => return FALLBACK_DIMENSION,
    };
    vocabulary
        .iter()
        .find(|name| text.contains(&name.to_lowercase()))
        .copied()
        .unwrap_or(FALLBACK_DIMENSION)
}

/// Infer the product from the free-text brand/SKU field.
pub fn infer_brand(brand_text: Option<&str>) -> &'static str {
    match_vocabulary(brand_text, KNOWN_BRANDS)
}

/// Infer the producing brewery from the branch name.
pub fn infer_brewery(branch: Option<&str>) -> &'static str {
    match_vocabulary(branch, KNOWN_BREWERIES)
}

/// Synthesize a deterministic dimension key: lowercase, spaces to
/// underscores, dots removed, anything non-alphanumeric dropped.
pub fn dimension_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace('.', "")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_brand_substring_match() {
        assert_eq!(infer_brand(Some("Golden Peak 330ml returnable")), "Golden Peak");
        assert_eq!(infer_brand(Some("crate of summit lager")), "Summit Lager");
    }

    #[test]
    fn test_infer_brand_fallback() {
        assert_eq!(infer_brand(Some("mystery brew")), FALLBACK_DIMENSION);
        assert_eq!(infer_brand(None), FALLBACK_DIMENSION);
    }

    #[test]
    fn test_infer_brewery_from_branch() {
        assert_eq!(infer_brewery(Some("Depot - Northgate Brewery")), "Northgate Brewery");
        assert_eq!(infer_brewery(Some("Head Office")), FALLBACK_DIMENSION);
    }

    #[test]
    fn test_dimension_key_normalization() {
        assert_eq!(dimension_key("Golden Peak"), "golden_peak");
        assert_eq!(dimension_key("  St. George's Outlet "), "st_georges_outlet");
        assert_eq!(dimension_key("Unspecified"), "unspecified");
    }
}
