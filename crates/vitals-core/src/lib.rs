//! vitals-core — shared library for the vitals ecosystem.
//!
//! Provides:
//! - `model` — telemetry samples and stored records for both families
//! - `payload` — lenient ingestion payload parsing (single vs. batch)
//! - `store` — SQLite-backed time-series store, migrations, query layer
//!
//! With `api` feature:
//! - OpenAPI schema derives on record types (used by vitals-web)

pub mod model;
pub mod payload;
pub mod store;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
