//! agni-export: windowed session scan, dedup, enrichment, and CSV export
//! for AGNI deployments.
//!
//! This crate provides:
//! - An authenticated client for the AGNI REST API
//! - Backward time-windowed pagination of `session.list`
//! - Concurrent, cache-assisted enrichment lookups
//! - Column-ordered CSV export

pub mod api;
pub mod cache;
pub mod config;
pub mod enrich;
pub mod export;
pub mod paginate;
pub mod stats;
