//! HTTP request handlers: ingestion and query endpoints.
//!
//! Ingestion parses the raw body (vitals-core::payload), so any non-JSON
//! input maps to 400 with no store mutation and missing fields are stored
//! as NULL. Query endpoints return empty collections rather than errors
//! when there is no data yet — dashboard consumers never special-case
//! "no data".

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use vitals_core::model::{ResourceRecord, StockRecord};
use vitals_core::payload::{self, PayloadError};
use vitals_core::store::StoreError;

use crate::state::SharedStore;

/// History window for resource charting.
const RESOURCE_HISTORY_LIMIT: usize = 100;
/// Per-symbol history window for stock charting.
const STOCK_HISTORY_LIMIT: usize = 30;
/// Default and maximum row caps for the tabular listing.
const TABLE_DEFAULT_LIMIT: usize = 100;
const TABLE_MAX_LIMIT: usize = 1000;

// ============================================================
// Health
// ============================================================

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================
// Ingestion
// ============================================================

#[derive(serde::Serialize, utoipa::ToSchema)]
pub(crate) struct IngestAck {
    message: String,
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub(crate) struct StockIngestAck {
    status: String,
    records_inserted: usize,
}

/// Accepts one resource sample per request.
#[utoipa::path(
    post,
    path = "/metrics",
    responses(
        (status = 200, description = "Sample stored", body = IngestAck),
        (status = 400, description = "Body is not a JSON object"),
        (status = 500, description = "Storage failure, nothing written")
    )
)]
pub(crate) async fn ingest_resource(
    State(store): State<SharedStore>,
    body: String,
) -> Result<Json<IngestAck>, (StatusCode, Json<Value>)> {
    let row = payload::parse_resource(&body).map_err(bad_request)?;

    let id = tokio::task::spawn_blocking(move || {
        let store = store.lock().unwrap();
        store.insert_resource(&row)
    })
    .await
    .map_err(internal)?
    .map_err(storage_error)?;

    info!(id, "resource sample stored");
    Ok(Json(IngestAck {
        message: "Metrics received".to_string(),
    }))
}

/// Accepts one stock quote or a batch of them; one transaction per request.
#[utoipa::path(
    post,
    path = "/stock_metrics",
    responses(
        (status = 201, description = "Batch stored", body = StockIngestAck),
        (status = 400, description = "Body is not JSON"),
        (status = 500, description = "Storage failure, no partial commit")
    )
)]
pub(crate) async fn ingest_stock(
    State(store): State<SharedStore>,
    body: String,
) -> Result<(StatusCode, Json<StockIngestAck>), (StatusCode, Json<Value>)> {
    let rows = payload::parse_stock(&body).map_err(bad_request)?.into_rows();

    let inserted = tokio::task::spawn_blocking(move || {
        let mut store = store.lock().unwrap();
        store.insert_stock_batch(&rows)
    })
    .await
    .map_err(internal)?
    .map_err(storage_error)?;

    info!(records = inserted, "stock batch stored");
    Ok((
        StatusCode::CREATED,
        Json(StockIngestAck {
            status: "success".to_string(),
            records_inserted: inserted,
        }),
    ))
}

// ============================================================
// Latest-value queries
// ============================================================

/// Latest resource record, `{}` when the store is empty.
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses(
        (status = 200, description = "Latest resource record as an object, {} when empty")
    )
)]
pub(crate) async fn latest_resource(State(store): State<SharedStore>) -> Json<Value> {
    let record = store.lock().unwrap().latest_resource().unwrap_or_else(|e| {
        error!(error = %e, "failed to read latest resource record");
        None
    });
    Json(record.map_or_else(|| json!({}), |r| json_or_empty(&r)))
}

/// One latest record per symbol, `[]` when the store is empty.
#[utoipa::path(
    get,
    path = "/api/stock_metrics",
    responses(
        (status = 200, description = "One latest record per symbol", body = Vec<StockRecord>)
    )
)]
pub(crate) async fn latest_stocks(State(store): State<SharedStore>) -> Json<Vec<StockRecord>> {
    let records = store
        .lock()
        .unwrap()
        .latest_stock_per_symbol()
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to read latest stock records");
            Vec::new()
        });
    Json(records)
}

// ============================================================
// Bounded history
// ============================================================

#[utoipa::path(
    get,
    path = "/api/historical/system_metrics",
    responses(
        (status = 200, description = "Up to 100 most recent resource records, ascending by time", body = Vec<ResourceRecord>)
    )
)]
pub(crate) async fn resource_history(
    State(store): State<SharedStore>,
) -> Json<Vec<ResourceRecord>> {
    let records = store
        .lock()
        .unwrap()
        .resource_history(RESOURCE_HISTORY_LIMIT)
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to read resource history");
            Vec::new()
        });
    Json(records)
}

#[derive(Deserialize, utoipa::IntoParams)]
pub(crate) struct StockHistoryQuery {
    /// Restrict the window to one symbol. Unset = every symbol gets its
    /// own window.
    symbol: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/historical/stock_metrics",
    params(StockHistoryQuery),
    responses(
        (status = 200, description = "Up to 30 records per symbol, ascending by time", body = Vec<StockRecord>)
    )
)]
pub(crate) async fn stock_history(
    State(store): State<SharedStore>,
    Query(query): Query<StockHistoryQuery>,
) -> Json<Vec<StockRecord>> {
    let records = store
        .lock()
        .unwrap()
        .stock_history(query.symbol.as_deref(), STOCK_HISTORY_LIMIT)
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to read stock history");
            Vec::new()
        });
    Json(records)
}

// ============================================================
// Tabular listing
// ============================================================

#[derive(Deserialize, utoipa::IntoParams)]
pub(crate) struct TableQuery {
    /// Restrict to one host identity.
    group_key: Option<String>,
    /// Row cap (default 100, max 1000).
    limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/metrics/table",
    params(TableQuery),
    responses(
        (status = 200, description = "Resource records, most recent first", body = Vec<ResourceRecord>)
    )
)]
pub(crate) async fn resource_table(
    State(store): State<SharedStore>,
    Query(query): Query<TableQuery>,
) -> Json<Vec<ResourceRecord>> {
    let limit = query.limit.unwrap_or(TABLE_DEFAULT_LIMIT).min(TABLE_MAX_LIMIT);
    let records = store
        .lock()
        .unwrap()
        .resource_table(query.group_key.as_deref(), limit)
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to read resource table");
            Vec::new()
        });
    Json(records)
}

// ============================================================
// Error mapping
// ============================================================

fn bad_request(e: PayloadError) -> (StatusCode, Json<Value>) {
    warn!(error = %e, "rejected ingestion payload");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": e.to_string() })),
    )
}

fn storage_error(e: StoreError) -> (StatusCode, Json<Value>) {
    error!(error = %e, "store write failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("Database error: {e}") })),
    )
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, Json<Value>) {
    error!(error = %e, "request processing failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal error" })),
    )
}

fn json_or_empty<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|_| json!({}))
}

// ============================================================
// Endpoint tests
// ============================================================
