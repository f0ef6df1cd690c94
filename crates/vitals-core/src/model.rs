//! Shared data models for both record families.
//!
//! A *sample* is what an agent emits, a *row* is what ingestion hands to
//! the store, and a *record* is what the store hands back — with the
//! server-assigned insertion id and receipt timestamp attached.

use serde::{Deserialize, Serialize};

/// Host resource sample emitted by the agent each tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSample {
    /// Stable identity of the emitting host (group key). Derived once at
    /// startup and reused for the process lifetime.
    pub group_key: String,
    /// Instantaneous CPU utilization, 0–100.
    pub cpu_usage: f64,
    /// Memory utilization, 0–100.
    pub memory_usage: f64,
    /// CPU temperature in degrees Celsius. Always present; the sampler
    /// substitutes a fallback constant when no sensor is readable.
    pub cpu_temp: f64,
    /// Client-side wall clock at sampling time.
    pub timestamp: String,
}

/// One stock quote, as fetched from the provider and sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    /// Ticker symbol (group key).
    pub symbol: String,
    /// Current price, > 0.
    pub price: f64,
    /// Change against previous close in percent, signed.
    pub change_percent: f64,
    /// Client-side wall clock at fetch time.
    pub timestamp: String,
}

/// Resource row as accepted by the store. Ingestion is lenient: any
/// measurement the payload did not carry stays NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceRow {
    pub group_key: String,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub cpu_temp: Option<f64>,
    /// Client-supplied timestamp, kept verbatim alongside the
    /// server-assigned receipt time.
    pub client_time: Option<String>,
}

/// Stock row as accepted by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockRow {
    pub symbol: Option<String>,
    pub price: Option<f64>,
    pub change_percent: Option<f64>,
    pub client_time: Option<String>,
}

/// Persisted resource record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct ResourceRecord {
    /// Server-assigned insertion id, strictly increasing.
    pub id: i64,
    pub group_key: String,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub cpu_temp: Option<f64>,
    /// Server receipt time (authoritative).
    pub recorded_at: String,
    /// Client-supplied timestamp, if the payload carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_time: Option<String>,
}

/// Persisted stock record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct StockRecord {
    /// Server-assigned insertion id, strictly increasing.
    pub id: i64,
    pub symbol: Option<String>,
    pub price: Option<f64>,
    pub change_percent: Option<f64>,
    /// Server receipt time (authoritative).
    pub recorded_at: String,
    /// Client-supplied timestamp, if the payload carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_time: Option<String>,
}
