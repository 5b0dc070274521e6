//! CSV parsing - character-at-a-time RFC4180 state machine
//!
//! Source exports are known to be irregular: header names padded with tabs,
//! byte-order marks, ragged rows, multi-line free-text fields, files cut off
//! mid-quote. The parser recovers from all of these instead of raising; the
//! caller gets whatever could be read.
//!
//! This function is DETERMINISTIC: same text = same rows.

use std::collections::BTreeMap;

/// Parsed CSV: cleaned header names plus one field-name -> value map per
/// data row, zipped positionally against the header row.
#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub records: Vec<BTreeMap<String, String>>,
    /// Rows whose fields were all empty after trimming. Skipped entirely;
    /// they do not count toward row totals.
    pub blank_rows: usize,
}

impl ParsedCsv {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Split raw text into rows of raw fields. Quote characters are kept
/// verbatim; they only govern whether `,` and line breaks act as
/// delimiters. Cleanup happens per field afterwards.
fn scan_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    // Escaped quote: keep the pair, collapse during cleanup
                    chars.next();
                    field.push('"');
                    field.push('"');
                } else {
                    in_quotes = false;
                    field.push('"');
                }
            } else {
                // Commas and line breaks are literal content here
                field.push(c);
            }
        } else {
            match c {
                '"' => {
                    in_quotes = true;
                    field.push('"');
                }
                ',' => row.push(std::mem::take(&mut field)),
                '\r' | '\n' => {
                    if c == '\r' && chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                _ => field.push(c),
            }
        }
    }

    // End of input flushes whatever was accumulated, even when a quote
    // never closed or the file lacks a trailing newline.
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Unwrap surrounding quotes and collapse escaped quotes (`""` -> `"`).
fn clean_value(raw: &str) -> String {
    let trimmed = raw.trim();
    let unwrapped = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    unwrapped.replace("\"\"", "\"")
}

/// Header cells additionally lose a leading byte-order mark and every
/// embedded tab (exports pad header names with tab runs).
fn clean_header(raw: &str) -> String {
    let raw = raw.trim().trim_start_matches('\u{feff}');
    let value = clean_value(raw);
    let name: String = value.chars().filter(|c| *c != '\t').collect();
    name.trim().to_string()
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|f| clean_value(f).trim().is_empty())
}

/// Parse CSV text into header names and field-name -> value maps.
///
/// The first completed non-blank row is the header row. Data rows are
/// zipped positionally against it: missing trailing fields default to the
/// empty string, extra unnamed trailing fields are dropped, and duplicate
/// header names let the last occurrence win. Blank rows are skipped.
/// Empty input yields zero headers and zero records without error.
pub fn parse(text: &str) -> ParsedCsv {
    let mut out = ParsedCsv::default();
    let mut headers: Option<Vec<String>> = None;

    for row in scan_rows(text) {
        if is_blank(&row) {
            out.blank_rows += 1;
            continue;
        }

        let header_names = match &headers {
            None => {
                headers = Some(row.iter().map(|f| clean_header(f)).collect());
                continue;
            }
            Some(names) => names,
        };

        let mut record = BTreeMap::new();
        for (idx, name) in header_names.iter().enumerate() {
            let value = row.get(idx).map(|f| clean_value(f)).unwrap_or_default();
            record.insert(name.clone(), value);
        }
        out.records.push(record);
    }

    out.headers = headers.unwrap_or_default();
    out
}

// =============================================================================
// TESTS - Critical for ensuring DETERMINISM and recovery behavior
// =============================================================================
