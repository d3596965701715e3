//! agni-export: exports a deduplicated, enriched device inventory for
//! one segment from an AGNI deployment to CSV.
//!
//! # Usage
//!
//! ```sh
//! AGNI_KEY_ID=... AGNI_KEY_VALUE=... agni-export \
//!     --segment corp-wifi --lookback-hours 24
//! ```
//!
//! Credentials come from the environment; everything else from the TOML
//! config file with CLI overrides.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use agni_common::{dedup_by_key, ExportSchema};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use agni_export::api::{AgniClient, SessionFilter};
use agni_export::config::ExportConfig;
use agni_export::enrich::Enricher;
use agni_export::export::{output_path, write_csv};
use agni_export::paginate::{ScanConfig, SessionScan};
use agni_export::stats::RunStats;

/// CLI arguments for agni-export.
#[derive(Parser, Debug)]
#[command(name = "agni-export")]
#[command(about = "Export deduplicated, enriched device records from AGNI to CSV")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/export.toml")]
    config: PathBuf,

    /// AGNI deployment base URL (overrides config file)
    #[arg(long, env = "AGNI_URL")]
    base_url: Option<String>,

    /// AGNI organization id (overrides config file)
    #[arg(long, env = "AGNI_ORG_ID")]
    org_id: Option<String>,

    /// API key id
    #[arg(long, env = "AGNI_KEY_ID", hide_env_values = true)]
    key_id: String,

    /// API key value
    #[arg(long, env = "AGNI_KEY_VALUE", hide_env_values = true)]
    key_value: String,

    /// Target segment name (overrides config file)
    #[arg(long)]
    segment: Option<String>,

    /// Hours to look back from now (overrides config file)
    #[arg(long)]
    lookback_hours: Option<i64>,

    /// Query window width in minutes (overrides config file)
    #[arg(long)]
    window_minutes: Option<i64>,

    /// Session status filter, e.g. "failed" (overrides config file)
    #[arg(long)]
    status: Option<String>,

    /// Skip enrichment lookups; export deduplicated raw sessions
    #[arg(long)]
    no_enrichment: bool,

    /// Explicit output file path (default: derived from segment + time)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration; a missing file falls back to defaults so a
    // pure-CLI invocation still works.
    let mut config = if args.config.exists() {
        match ExportConfig::from_file(&args.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {:#}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        ExportConfig::default()
    };

    config.apply_overrides(
        args.base_url,
        args.org_id,
        args.segment,
        args.lookback_hours,
        args.window_minutes,
        args.status,
        args.no_enrichment,
    );

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    info!("agni-export v{}", env!("CARGO_PKG_VERSION"));

    match run(config, &args.key_id, &args.key_value, args.output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Export failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    config: ExportConfig,
    key_id: &str,
    key_value: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    config.validate()?;

    let mut stats = RunStats::default();

    let client = AgniClient::new(&config.base_url, &config.org_id, config.request_timeout)
        .context("Failed to create API client")?;

    // Authentication and segment resolution are fatal; nothing useful
    // can be produced without them.
    client
        .login(key_id, key_value)
        .await
        .context("Login failed")?;

    info!("Looking up id for segment '{}'", config.segment);
    let segment_id = client
        .resolve_segment_id(&config.segment)
        .await
        .context("Segment lookup failed")?;
    info!("Segment '{}' resolved to id {}", config.segment, segment_id);

    // Scan: backward windowed pagination, skip-and-continue.
    let filter = SessionFilter {
        segment_id,
        session_type: config.session_type.clone(),
        status: config.status.clone(),
    };
    let scan = SessionScan::new(
        &client,
        ScanConfig {
            lookback: chrono::Duration::hours(config.lookback_hours),
            window: chrono::Duration::minutes(config.window_minutes),
            page_limit: config.page_limit,
            window_delay: config.window_delay,
        },
    );
    let scanned = scan.run(&filter).await;
    stats.windows_scanned = scanned.windows_scanned;
    stats.windows_failed = scanned.windows_failed;
    stats.raw_records = scanned.records.len();

    // Dedup to one record per device.
    let deduped = dedup_by_key(scanned.records, "mac", config.dedup_policy);
    stats.dropped_keyless = deduped.dropped_keyless;
    stats.unique_devices = deduped.devices.len();
    info!(
        "Found {} unique devices ({} policy)",
        deduped.devices.len(),
        config.dedup_policy
    );

    // Enrich, or pass the raw deduplicated records straight through.
    let records = if config.enrichment && !deduped.devices.is_empty() {
        let api = Arc::new(client);
        let enricher = Enricher::new(api, config.concurrency);
        let outcome = enricher.enrich_all(deduped.devices).await;
        stats.lookups_empty = outcome.lookups_empty;
        stats.cache_hits = outcome.cache_hits;
        stats.cache_misses = outcome.cache_misses;
        outcome.records
    } else {
        deduped.devices.into_values().collect()
    };

    if records.is_empty() {
        warn!("No records found to export");
        stats.log_summary();
        return Ok(());
    }

    // Project and write.
    let schema = ExportSchema::from_records(&records, &config.priority_columns);
    let path = output.unwrap_or_else(|| output_path(&config.output_dir, &config.segment));
    stats.rows_exported = write_csv(&path, &schema, &records)?;

    stats.log_summary();
    Ok(())
}
