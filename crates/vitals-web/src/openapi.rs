//! OpenAPI documentation definition.

use utoipa::OpenApi;

use vitals_core::model::{ResourceRecord, StockRecord};

use crate::handlers::{IngestAck, StockIngestAck};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::handle_health,
        crate::handlers::ingest_resource,
        crate::handlers::ingest_stock,
        crate::handlers::latest_resource,
        crate::handlers::latest_stocks,
        crate::handlers::resource_history,
        crate::handlers::stock_history,
        crate::handlers::resource_table,
    ),
    components(schemas(ResourceRecord, StockRecord, IngestAck, StockIngestAck)),
    info(
        title = "vitals API",
        description = "Telemetry ingestion and query endpoints — host resource and stock quote time series"
    )
)]
pub(crate) struct ApiDoc;
