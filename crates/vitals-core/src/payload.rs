//! Ingestion payload parsing.
//!
//! The server accepts whatever JSON the agents send: missing or mistyped
//! fields become NULL columns instead of rejections, and the
//! single-vs-batch shape of the stock endpoint is decided exactly once
//! here. Anything that is not JSON at all is a [`PayloadError`], which
//! the handlers map to 400 with no store mutation.

use serde_json::Value;
use thiserror::Error;

use crate::model::{ResourceRow, StockRow};

/// Group key stored when a resource payload does not identify its host.
pub const UNKNOWN_GROUP_KEY: &str = "unknown";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("request body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object")]
    NotAnObject,
}

/// Parses a resource ingestion body: exactly one JSON object.
pub fn parse_resource(body: &str) -> Result<ResourceRow, PayloadError> {
    let value: Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(PayloadError::NotAnObject);
    }
    Ok(ResourceRow {
        group_key: field_str(&value, "group_key")
            .unwrap_or_else(|| UNKNOWN_GROUP_KEY.to_string()),
        cpu_usage: field_f64(&value, "cpu_usage"),
        memory_usage: field_f64(&value, "memory_usage"),
        cpu_temp: field_f64(&value, "cpu_temp"),
        client_time: field_str(&value, "timestamp"),
    })
}

/// Stock ingestion payload: one quote object, or a batch of them.
#[derive(Debug, Clone, PartialEq)]
pub enum StockPayload {
    Single(StockRow),
    Batch(Vec<StockRow>),
}

impl StockPayload {
    /// Flattens to the list of rows to insert.
    pub fn into_rows(self) -> Vec<StockRow> {
        match self {
            Self::Single(row) => vec![row],
            Self::Batch(rows) => rows,
        }
    }
}

/// Parses a stock ingestion body. A top-level array is a batch; every
/// element becomes a row of its own.
pub fn parse_stock(body: &str) -> Result<StockPayload, PayloadError> {
    let value: Value = serde_json::from_str(body)?;
    match &value {
        Value::Array(elements) => Ok(StockPayload::Batch(
            elements.iter().map(stock_row).collect(),
        )),
        Value::Object(_) => Ok(StockPayload::Single(stock_row(&value))),
        _ => Err(PayloadError::NotAnObject),
    }
}

// Field access is tolerant: a malformed element yields an all-NULL row
// instead of aborting its siblings.
fn stock_row(value: &Value) -> StockRow {
    StockRow {
        symbol: field_str(value, "symbol"),
        price: field_f64(value, "price"),
        change_percent: field_f64(value, "change_percent"),
        client_time: field_str(value, "timestamp"),
    }
}

fn field_f64(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}

fn field_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_object_parses_all_fields() {
        let row = parse_resource(
            r#"{"group_key":"lab-1","cpu_usage":41.5,"memory_usage":72.1,"cpu_temp":55.0,"timestamp":"2026-08-06 10:00:00"}"#,
        )
        .unwrap();
        assert_eq!(row.group_key, "lab-1");
        assert_eq!(row.cpu_usage, Some(41.5));
        assert_eq!(row.memory_usage, Some(72.1));
        assert_eq!(row.cpu_temp, Some(55.0));
        assert_eq!(row.client_time.as_deref(), Some("2026-08-06 10:00:00"));
    }

    #[test]
    fn resource_missing_fields_become_null() {
        let row = parse_resource("{}").unwrap();
        assert_eq!(row.group_key, UNKNOWN_GROUP_KEY);
        assert_eq!(row.cpu_usage, None);
        assert_eq!(row.memory_usage, None);
        assert_eq!(row.cpu_temp, None);
        assert_eq!(row.client_time, None);
    }

    #[test]
    fn resource_rejects_non_json() {
        assert!(matches!(
            parse_resource("cpu=41.5"),
            Err(PayloadError::Json(_))
        ));
    }

    #[test]
    fn resource_rejects_non_object() {
        assert!(matches!(
            parse_resource("[1,2,3]"),
            Err(PayloadError::NotAnObject)
        ));
    }

    #[test]
    fn stock_single_object_is_single() {
        let payload =
            parse_stock(r#"{"symbol":"AAPL","price":190.5,"change_percent":-0.4}"#).unwrap();
        let rows = payload.into_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol.as_deref(), Some("AAPL"));
        assert_eq!(rows[0].price, Some(190.5));
    }

    #[test]
    fn stock_array_is_batch_with_one_row_per_element() {
        let payload = parse_stock(
            r#"[{"symbol":"AAPL","price":190.5},{"symbol":"MSFT","price":410.0},{"symbol":"GOOGL"}]"#,
        )
        .unwrap();
        let rows = payload.into_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].symbol.as_deref(), Some("GOOGL"));
        assert_eq!(rows[2].price, None);
    }

    #[test]
    fn stock_mistyped_field_is_null_not_an_error() {
        let payload = parse_stock(r#"{"symbol":"AAPL","price":"n/a"}"#).unwrap();
        let rows = payload.into_rows();
        assert_eq!(rows[0].symbol.as_deref(), Some("AAPL"));
        assert_eq!(rows[0].price, None);
    }

    #[test]
    fn stock_rejects_scalar_body() {
        assert!(matches!(
            parse_stock("\"AAPL\""),
            Err(PayloadError::NotAnObject)
        ));
    }
}
