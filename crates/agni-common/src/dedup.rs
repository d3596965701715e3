//! Natural-key deduplication of raw session records.

use std::collections::HashMap;

use crate::types::{DedupPolicy, Record};

/// Result of a dedup pass.
#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Natural key -> surviving record.
    pub devices: HashMap<String, Record>,
    /// Records excluded for lacking a usable natural key. Not an error.
    pub dropped_keyless: usize,
}

/// Reduces a record stream to one record per natural key.
///
/// Records whose `key_field` is missing, empty, or not a string are
/// silently excluded. When a key recurs the survivor is chosen by
/// `policy`; the input order is assumed to be the scan order (newest
/// window first), which is what makes `NewestWins` a keep-first rule.
pub fn dedup_by_key(
    records: impl IntoIterator<Item = Record>,
    key_field: &str,
    policy: DedupPolicy,
) -> DedupOutcome {
    let mut outcome = DedupOutcome::default();

    for record in records {
        let key = match record.get(key_field).and_then(|v| v.as_str()) {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => {
                outcome.dropped_keyless += 1;
                continue;
            }
        };

        match policy {
            DedupPolicy::NewestWins => {
                outcome.devices.entry(key).or_insert(record);
            }
            DedupPolicy::OldestWins => {
                outcome.devices.insert(key, record);
            }
        }
    }

    outcome
}
