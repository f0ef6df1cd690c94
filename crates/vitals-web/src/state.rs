//! Shared application state.

use std::sync::{Arc, Mutex};

use vitals_core::store::MetricsStore;

/// The SQLite store behind a mutex. Handlers hold the lock for the
/// duration of a single transaction; WAL keeps that short.
pub(crate) type SharedStore = Arc<Mutex<MetricsStore>>;
