//! Reporter Service - Loads an interaction-report CSV and prints dashboard metrics
//!
//! Responsibilities:
//! - Acquire CSV text from a file path or URL (the async, cancellable step)
//! - Hand the bytes to the metrics engine (synchronous, CPU-bound)
//! - Print the dashboard summary, or emit the full snapshot as JSON
//!
//! Acquisition failures are hard failures of the load operation; the
//! engine's cached snapshot is only replaced after a successful fetch.
//!
//! Usage:
//!   cargo run --bin reporter -- --input data/complaints.csv
//!   cargo run --bin reporter -- --url https://example.com/export.csv --json

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use engine::{MetricsExtractor, MetricsSnapshot, SnapshotCache};

#[derive(Parser, Debug)]
#[command(
    name = "reporter",
    about = "Loads interaction-report CSV exports and prints dashboard metrics"
)]
struct Args {
    /// Path to a CSV export file
    #[arg(long, conflicts_with = "url")]
    input: Option<PathBuf>,

    /// URL to fetch a CSV export from
    #[arg(long)]
    url: Option<String>,

    /// Emit the full snapshot as JSON instead of the text summary
    #[arg(long, default_value = "false")]
    json: bool,

    /// Reference date anchoring the trend window (defaults to today, UTC)
    #[arg(long)]
    reference_date: Option<NaiveDate>,

    /// Exit non-zero when validation reports issues
    #[arg(long, default_value = "false")]
    strict: bool,
}

#[derive(Debug, Clone)]
struct Config {
    fetch_timeout_secs: u64,
}

impl Config {
    fn from_env() -> Self {
        Self {
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
        }
    }
}

/// Fetch the raw bytes and a source label from whichever input mode the
/// caller picked.
async fn acquire(args: &Args, config: &Config) -> Result<(Vec<u8>, String)> {
    if let Some(path) = &args.input {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok((bytes, path.display().to_string()))
    } else if let Some(url) = &args.url {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent("InteractionReporter/0.1 (quality dashboard ingestion)")
            .build()?;
        let resp = client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .context("HTTP request failed")?;
        let bytes = resp.bytes().await?;
        Ok((bytes.to_vec(), url.clone()))
    } else {
        bail!(
            "Must specify either:\n  \
             --input <path> for a local export, or\n  \
             --url <url> to fetch one"
        );
    }
}

fn print_summary(snapshot: &MetricsSnapshot) {
    println!("\n=== Dashboard Summary ===");
    println!("Total complaints:   {}", snapshot.total_complaints);
    println!("Open:               {}", snapshot.open_complaints);
    println!("Closed:             {}", snapshot.closed_complaints);
    println!("Escalated records:  {}", snapshot.escalated_records);
    println!("SLA adherence:      {:.1}%", snapshot.sla_adherence_pct);
    println!("Escalation rate:    {:.1}%", snapshot.escalation_rate_pct);
    println!("Resolution rate:    {:.1}%", snapshot.resolution_rate_pct);
    if let Some((from, to)) = snapshot.date_range {
        println!("Date range:         {} .. {}", from, to);
    }

    if !snapshot.category_breakdown.is_empty() {
        println!("\nTop categories (unique tickets):");
        for entry in &snapshot.category_breakdown {
            println!("  {:<30} {:>5}  {:>5.1}%", entry.label, entry.count, entry.share_pct);
        }
    }

    if !snapshot.zone_breakdown.is_empty() {
        println!("\nTop zones (records):");
        for entry in &snapshot.zone_breakdown {
            println!("  {:<30} {:>5}  {:>5.1}%", entry.label, entry.count, entry.share_pct);
        }
    }

    if !snapshot.risk_hotspots.is_empty() {
        println!("\nRisk hotspots:");
        for hotspot in &snapshot.risk_hotspots {
            println!(
                "  {:?} {} / {} ({} records)",
                hotspot.tier, hotspot.department, hotspot.sub_category, hotspot.record_count
            );
        }
    }

    println!("\nTrend (last 7 of 30 days):");
    for point in snapshot.trend.iter().rev().take(7).rev() {
        println!(
            "  {}  created={:<4} closed={:<4} escalated={}",
            point.date, point.created_unique, point.closed_records, point.escalated_records
        );
    }

    println!(
        "\nMaster data (inferred, best-effort): {} products, {} breweries, {} outlets",
        snapshot.products.len(),
        snapshot.breweries.len(),
        snapshot.outlets.len()
    );

    println!("\nValidation: {}", if snapshot.validation.is_valid { "ok" } else { "issues found" });
    for issue in &snapshot.validation.issues {
        println!("  - {}", issue);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Config::from_env();

    if !args.json {
        println!("=== Interaction Reporter ===");
    }

    let (bytes, source) = acquire(&args, &config).await?;
    if !args.json {
        println!("Source: {}", source);
        println!("Content size: {} bytes", bytes.len());
    }

    let cache = SnapshotCache::new();
    let report = cache.load_from_bytes(&bytes, &source);

    if !args.json {
        println!("Hash: {}", report.content_hash);
        println!("Dataset: {}", report.dataset_id);
        println!(
            "Loaded {} records ({} blank rows skipped)",
            report.records_loaded, report.blank_rows_skipped
        );
        if !report.warnings.is_empty() {
            println!("Load warnings ({}):", report.warnings.len());
            for warning in report.warnings.iter().take(5) {
                println!("  - {}", warning);
            }
            if report.warnings.len() > 5 {
                println!("  ... and {} more", report.warnings.len() - 5);
            }
        }
        if !cache.has_sufficient_real_data() {
            println!("Note: below the real-data threshold; dashboards would fall back to synthetic metrics");
        }
    }

    let dataset = cache
        .current()
        .context("No dataset loaded")?;
    let reference_date = args.reference_date.unwrap_or_else(|| Utc::now().date_naive());
    let extractor = MetricsExtractor::with_reference_date(&dataset.records, reference_date);
    let snapshot = extractor.snapshot();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_summary(&snapshot);
    }

    if args.strict && !snapshot.validation.is_valid {
        bail!("Validation failed with {} issue(s)", snapshot.validation.issues.len());
    }

    Ok(())
}
