//! End-of-run statistics.

use tracing::info;

/// Counters accumulated across the pipeline stages, logged once at the
/// end of a run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub windows_scanned: usize,
    pub windows_failed: usize,
    pub raw_records: usize,
    pub dropped_keyless: usize,
    pub unique_devices: usize,
    pub lookups_empty: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rows_exported: usize,
}

impl RunStats {
    pub fn log_summary(&self) {
        info!(
            "Run summary: windows={} (failed={}), raw={}, keyless={}, devices={}, \
             empty_lookups={}, nad_cache hits={} misses={}, exported={}",
            self.windows_scanned,
            self.windows_failed,
            self.raw_records,
            self.dropped_keyless,
            self.unique_devices,
            self.lookups_empty,
            self.cache_hits,
            self.cache_misses,
            self.rows_exported,
        );
    }
}
