//! Shared types and pure transforms for the AGNI device export tools.
//!
//! This crate contains:
//! - Common types (Record, TimeWindow, DedupPolicy) and the window plan
//! - Natural-key deduplication
//! - Field-merge rules for enrichment (flatten + collision handling)
//! - Export schema projection (column ordering, row rendering)

pub mod dedup;
pub mod merge;
pub mod schema;
pub mod types;

pub use dedup::{dedup_by_key, DedupOutcome};
pub use merge::{flatten_attributes, flatten_certificate, merge_fields, merge_identity};
pub use schema::ExportSchema;
pub use types::{window_plan, DedupPolicy, Record, TimeWindow};
