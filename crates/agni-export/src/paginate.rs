//! Backward time-windowed pagination of `session.list`.
//!
//! The upstream caps results per call (~1000), so a long lookback is
//! split into fixed-width windows queried newest-first. A window that
//! still holds more rows than the cap is truncated silently; shrinking
//! `window_minutes` is the mitigation, not sub-paging.

use std::time::Duration;

use agni_common::{window_plan, Record, TimeWindow};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::api::{SessionFilter, SessionSource};

/// Tunables for one scan pass.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Lower bound of the scan range, measured back from now.
    pub lookback: chrono::Duration,
    /// Width of each query window.
    pub window: chrono::Duration,
    /// Max records requested per window.
    pub page_limit: usize,
    /// Fixed delay between window queries, success or not.
    pub window_delay: Duration,
}

/// Result of a scan pass.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Raw session records in scan order (newest window first).
    pub records: Vec<Record>,
    pub windows_scanned: usize,
    pub windows_failed: usize,
}

/// Walks the window plan against a session source, accumulating raw
/// records.
pub struct SessionScan<'a> {
    source: &'a dyn SessionSource,
    config: ScanConfig,
}

impl<'a> SessionScan<'a> {
    pub fn new(source: &'a dyn SessionSource, config: ScanConfig) -> Self {
        Self { source, config }
    }

    /// Runs the scan. A failed window is logged and skipped with no
    /// retry; pagination always reaches the lower bound.
    pub async fn run(&self, filter: &SessionFilter) -> ScanOutcome {
        let windows = window_plan(Utc::now(), self.config.lookback, self.config.window);
        info!(
            "Scanning {} windows of {}m back to {}h ago (segment {})",
            windows.len(),
            self.config.window.num_minutes(),
            self.config.lookback.num_hours(),
            filter.segment_id,
        );

        let mut outcome = ScanOutcome::default();

        for window in &windows {
            outcome.windows_scanned += 1;
            self.fetch_window(window, filter, &mut outcome).await;

            // Fixed inter-window throttle, applied regardless of outcome.
            tokio::time::sleep(self.config.window_delay).await;
        }

        info!("Total raw sessions fetched: {}", outcome.records.len());
        outcome
    }

    async fn fetch_window(
        &self,
        window: &TimeWindow,
        filter: &SessionFilter,
        outcome: &mut ScanOutcome,
    ) {
        match self
            .source
            .list_sessions(window, filter, self.config.page_limit)
            .await
        {
            Ok(records) => {
                if !records.is_empty() {
                    debug!("Window {}: {} records", window, records.len());
                    if records.len() >= self.config.page_limit {
                        warn!(
                            "Window {} returned {} records (at the page limit); results may be truncated",
                            window,
                            records.len()
                        );
                    }
                    outcome.records.extend(records);
                }
            }
            Err(e) => {
                warn!("Session query failed for window {}: {}", window, e);
                outcome.windows_failed += 1;
            }
        }
    }
}
