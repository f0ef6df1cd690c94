//! Agent-to-server transport: sample transmission and remote stop polling.
//!
//! The [`Uplink`] trait is the seam between the collector loop and the
//! network, so loop behavior is testable without a live server.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum UplinkError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    Status(u16),
}

/// Transport seam between the collector loop and the server.
pub trait Uplink {
    /// POSTs one JSON sample to the ingestion endpoint.
    fn send(&self, body: &Value) -> Result<(), UplinkError>;

    /// Polls the stop endpoint. Transport errors fail open: an
    /// unreachable status endpoint means keep collecting.
    fn stop_requested(&self) -> bool;
}

#[derive(Deserialize)]
struct StatusResponse {
    command: Option<String>,
}

/// HTTP uplink used in production.
pub struct HttpUplink {
    client: reqwest::blocking::Client,
    ingest_url: String,
    status_url: Option<String>,
}

impl HttpUplink {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(ingest_url: String, status_url: Option<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            ingest_url,
            status_url,
        }
    }
}

impl Uplink for HttpUplink {
    fn send(&self, body: &Value) -> Result<(), UplinkError> {
        let response = self.client.post(&self.ingest_url).json(body).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(UplinkError::Status(status.as_u16()));
        }
        debug!(url = %self.ingest_url, status = status.as_u16(), "sample delivered");
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        let Some(url) = &self.status_url else {
            return false;
        };
        let response = match self.client.get(url).send() {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(url = %url, status = response.status().as_u16(), "stop check failed");
                return false;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "stop check failed");
                return false;
            }
        };
        match response.json::<StatusResponse>() {
            Ok(status) => status.command.as_deref() == Some("STOP"),
            Err(e) => {
                warn!(url = %url, error = %e, "stop response was not JSON");
                false
            }
        }
    }
}
