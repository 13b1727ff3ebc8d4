//! # Usage Tracker
//!
//! A local tracker for monthly competitive usage-statistics snapshots.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (usage records, periods, resolved profiles)
//! - **normalize**: Raw snapshot document to flat per-period records
//! - **storage**: Parquet-backed snapshot store with per-period upsert and schema repair
//! - **resolve**: Name and profile resolution (exact, substring, fuzzy)
//! - **aggregate**: All-time rollups and meta counts
//! - **query**: Cached read service over the store
//! - **fetch**: Snapshot sources (HTTP, local raw files)
//! - **ingest**: Period planning and the per-period ingestion run
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod aggregate;
pub mod api;
pub mod config;
pub mod fetch;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod query;
pub mod resolve;
pub mod storage;

pub use models::*;
