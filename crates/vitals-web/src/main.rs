//! vitals-web - Telemetry collector and query API server.
//!
//! Receives samples POSTed by vitalsd agents, persists them to the
//! SQLite time-series store, and serves latest/history read-back for the
//! dashboard. An optional background loop enforces retention.

mod background;
mod handlers;
mod openapi;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::routing::{get, post};
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use vitals_core::store::MetricsStore;

use openapi::ApiDoc;
use state::SharedStore;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(name = "vitals-web", about = "vitals collector and query API server", version = vitals_core::VERSION)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:8080", env = "VITALS_LISTEN")]
    listen: String,

    /// Path to the SQLite database file.
    #[arg(long, default_value = "./vitals.db", env = "VITALS_DB")]
    db: PathBuf,

    /// Remove records older than this many days (daily background prune).
    /// Retention is unlimited when unset.
    #[arg(long, env = "VITALS_RETENTION_DAYS")]
    retention_days: Option<u32>,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitals_web=info,vitals_core=info".parse().unwrap()),
        )
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async_main(args));
}

async fn async_main(args: Args) {
    info!(version = vitals_core::VERSION, db = %args.db.display(), "starting");

    let store = match MetricsStore::open(&args.db) {
        Ok(store) => store,
        Err(e) => {
            error!(path = %args.db.display(), error = %e, "failed to open metrics store");
            process::exit(1);
        }
    };
    let state: SharedStore = Arc::new(Mutex::new(store));

    if let Some(days) = args.retention_days {
        info!(retention_days = days, "retention prune enabled");
        let state_clone = state.clone();
        tokio::spawn(async move {
            background::retention_loop(state_clone, days).await;
        });
    }

    let app = router(state);

    let addr: SocketAddr = args.listen.parse().expect("invalid listen address");
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    axum::serve(listener, app).await.expect("server error");
}

/// Builds the full application router. Shared with the endpoint tests.
pub(crate) fn router(state: SharedStore) -> Router {
    Router::new()
        .route("/api/health", get(handlers::handle_health))
        .route("/metrics", post(handlers::ingest_resource))
        .route("/stock_metrics", post(handlers::ingest_stock))
        .route("/api/metrics", get(handlers::latest_resource))
        .route("/api/metrics/table", get(handlers::resource_table))
        .route("/api/stock_metrics", get(handlers::latest_stocks))
        .route(
            "/api/historical/system_metrics",
            get(handlers::resource_history),
        )
        .route(
            "/api/historical/stock_metrics",
            get(handlers::stock_history),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .with_state(state)
}
