//! Configuration for agni-export.
//!
//! Supports loading from TOML file with CLI argument overrides.
//! Credentials never live in the file; they arrive through the
//! environment (see `main.rs`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use agni_common::DedupPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Default priority columns for the exported CSV.
const DEFAULT_PRIORITY_COLUMNS: &[&str] = &[
    "mac",
    "username",
    "userID",
    "switch_name",
    "switch_interface",
    "ip",
    "deviceType",
    "description",
    "nadName",
    "segmentName",
    "location",
    "lastAuthAt",
    "cert_expiry",
];

/// Top-level configuration for agni-export.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// AGNI deployment base URL (no trailing slash needed).
    pub base_url: String,
    pub org_id: String,
    pub request_timeout: Duration,

    /// Target segment name, resolved to an id at startup.
    pub segment: String,
    pub lookback_hours: i64,
    pub window_minutes: i64,
    /// Optional session status filter (e.g. "failed").
    pub status: Option<String>,
    pub session_type: String,
    pub page_limit: usize,
    pub window_delay: Duration,

    pub enrichment: bool,
    pub concurrency: usize,

    pub output_dir: PathBuf,
    pub priority_columns: Vec<String>,

    pub log_level: String,
    pub dedup_policy: DedupPolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            org_id: String::new(),
            request_timeout: Duration::from_secs(30),
            segment: "Default".to_string(),
            lookback_hours: 24,
            window_minutes: 30,
            status: None,
            session_type: "network_access".to_string(),
            page_limit: 1000,
            window_delay: Duration::from_millis(100),
            enrichment: true,
            concurrency: 20,
            output_dir: PathBuf::from("."),
            priority_columns: DEFAULT_PRIORITY_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            log_level: "info".to_string(),
            dedup_policy: DedupPolicy::NewestWins,
        }
    }
}

impl ExportConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlConfig = toml::from_str(content).context("Failed to parse TOML config")?;
        Self::try_from(file)
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(
        &mut self,
        base_url: Option<String>,
        org_id: Option<String>,
        segment: Option<String>,
        lookback_hours: Option<i64>,
        window_minutes: Option<i64>,
        status: Option<String>,
        no_enrichment: bool,
    ) {
        if let Some(url) = base_url {
            self.base_url = url;
        }
        if let Some(org) = org_id {
            self.org_id = org;
        }
        if let Some(segment) = segment {
            self.segment = segment;
        }
        if let Some(hours) = lookback_hours {
            self.lookback_hours = hours;
        }
        if let Some(minutes) = window_minutes {
            self.window_minutes = minutes;
        }
        if let Some(status) = status {
            self.status = Some(status);
        }
        if no_enrichment {
            self.enrichment = false;
        }
    }

    /// Validates the fields without which the run cannot start.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            anyhow::bail!("Missing AGNI base URL (set [agni].base_url or AGNI_URL)");
        }
        if self.org_id.is_empty() {
            anyhow::bail!("Missing AGNI org id (set [agni].org_id or AGNI_ORG_ID)");
        }
        if self.segment.is_empty() {
            anyhow::bail!("Missing target segment name");
        }
        if self.lookback_hours <= 0 || self.window_minutes <= 0 {
            anyhow::bail!("lookback_hours and window_minutes must be positive");
        }
        Ok(())
    }
}

/// TOML file structure for deserialization.
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    agni: AgniToml,
    #[serde(default)]
    scan: ScanToml,
    #[serde(default)]
    enrich: EnrichToml,
    #[serde(default)]
    export: ExportToml,
    #[serde(default)]
    general: GeneralToml,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AgniToml {
    base_url: String,
    org_id: String,
    request_timeout_secs: u64,
}

impl Default for AgniToml {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            org_id: String::new(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ScanToml {
    segment: String,
    lookback_hours: i64,
    window_minutes: i64,
    status: Option<String>,
    session_type: String,
    page_limit: usize,
    window_delay_ms: u64,
}

impl Default for ScanToml {
    fn default() -> Self {
        Self {
            segment: "Default".to_string(),
            lookback_hours: 24,
            window_minutes: 30,
            status: None,
            session_type: "network_access".to_string(),
            page_limit: 1000,
            window_delay_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct EnrichToml {
    enabled: bool,
    concurrency: usize,
}

impl Default for EnrichToml {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ExportToml {
    output_dir: PathBuf,
    priority_columns: Vec<String>,
}

impl Default for ExportToml {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            priority_columns: DEFAULT_PRIORITY_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GeneralToml {
    log_level: String,
    dedup_policy: String,
}

impl Default for GeneralToml {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            dedup_policy: "newest-wins".to_string(),
        }
    }
}

impl TryFrom<TomlConfig> for ExportConfig {
    type Error = anyhow::Error;

    fn try_from(toml: TomlConfig) -> Result<Self> {
        let dedup_policy: DedupPolicy = toml
            .general
            .dedup_policy
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        Ok(Self {
            base_url: toml.agni.base_url,
            org_id: toml.agni.org_id,
            request_timeout: Duration::from_secs(toml.agni.request_timeout_secs),
            segment: toml.scan.segment,
            lookback_hours: toml.scan.lookback_hours,
            window_minutes: toml.scan.window_minutes,
            status: toml.scan.status,
            session_type: toml.scan.session_type,
            page_limit: toml.scan.page_limit,
            window_delay: Duration::from_millis(toml.scan.window_delay_ms),
            enrichment: toml.enrich.enabled,
            concurrency: toml.enrich.concurrency,
            output_dir: toml.export.output_dir,
            priority_columns: toml.export.priority_columns,
            log_level: toml.general.log_level,
            dedup_policy,
        })
    }
}
