//! Concurrent enrichment of deduplicated device records.
//!
//! Each device fans out to up to three lookups: switch name by NAD id
//! (cache-backed, switches repeat heavily across devices), switch port
//! by auth request id, and extended client identity by MAC. Workers
//! share nothing but the lookup cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use agni_common::{merge_identity, Record};
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::api::DirectoryApi;
use crate::cache::LookupCache;

/// Field set by the cached switch-name lookup.
const SWITCH_NAME_FIELD: &str = "switch_name";

/// Field set by the session-detail port lookup.
const SWITCH_INTERFACE_FIELD: &str = "switch_interface";

/// Log progress every this many devices.
const PROGRESS_EVERY: usize = 25;

/// Result of an enrichment pass.
pub struct EnrichOutcome {
    /// Enriched records, in no particular order.
    pub records: Vec<Record>,
    /// Individual lookups that produced no data (failure or absence).
    pub lookups_empty: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Fans enrichment out across a bounded worker pool.
pub struct Enricher {
    api: Arc<dyn DirectoryApi>,
    nad_cache: LookupCache<String, String>,
    concurrency: usize,
}

impl Enricher {
    pub fn new(api: Arc<dyn DirectoryApi>, concurrency: usize) -> Self {
        Self {
            api,
            nad_cache: LookupCache::new(),
            concurrency: concurrency.max(1),
        }
    }

    /// Enriches every device in the map. Lookup failures degrade to
    /// missing fields; nothing here aborts a device or the batch.
    pub async fn enrich_all(&self, devices: HashMap<String, Record>) -> EnrichOutcome {
        let total = devices.len();
        info!(
            "Enriching {} devices with {} workers",
            total, self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let processed = Arc::new(AtomicUsize::new(0));
        let lookups_empty = Arc::new(AtomicU64::new(0));

        let futures: Vec<_> = devices
            .into_iter()
            .map(|(mac, record)| {
                let semaphore = Arc::clone(&semaphore);
                let processed = Arc::clone(&processed);
                let lookups_empty = Arc::clone(&lookups_empty);

                async move {
                    // Semaphore is never closed, acquire cannot fail.
                    let _permit = semaphore.acquire().await.unwrap();

                    let record = self.enrich_device(&mac, record, &lookups_empty).await;

                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % PROGRESS_EVERY == 0 || done == total {
                        info!("Enriched {}/{} devices", done, total);
                    }

                    record
                }
            })
            .collect();

        let records = join_all(futures).await;

        EnrichOutcome {
            records,
            lookups_empty: lookups_empty.load(Ordering::Relaxed),
            cache_hits: self.nad_cache.hits(),
            cache_misses: self.nad_cache.misses(),
        }
    }

    /// Enriches one device record in place (on an owned copy).
    async fn enrich_device(
        &self,
        mac: &str,
        mut record: Record,
        lookups_empty: &AtomicU64,
    ) -> Record {
        // Switch name, via the shared cache.
        if let Some(nad_id) = field_as_id(&record, "nadID") {
            let api = Arc::clone(&self.api);
            let lookup_id = nad_id.clone();
            match self
                .nad_cache
                .get_or_fetch(nad_id, move || async move { api.nad_name(&lookup_id).await })
                .await
            {
                Some(name) => {
                    record.insert(SWITCH_NAME_FIELD.to_string(), Value::String(name));
                }
                None => {
                    lookups_empty.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        // Switch port, keyed per session; nothing to cache.
        if let Some(auth_req_id) = field_as_id(&record, "authReqID") {
            match self.api.session_port(&auth_req_id).await {
                Some(port) => {
                    record.insert(SWITCH_INTERFACE_FIELD.to_string(), Value::String(port));
                }
                None => {
                    lookups_empty.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        // Extended client identity, always attempted.
        match self.api.client_identity(mac).await {
            Some(identity) => merge_identity(&mut record, identity),
            None => {
                debug!("No identity data for {}", mac);
                lookups_empty.fetch_add(1, Ordering::Relaxed);
            }
        }

        record
    }
}

/// Reads a field as a lookup id; string or numeric ids both occur.
fn field_as_id(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
