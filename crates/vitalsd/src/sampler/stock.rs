//! Stock quote sampling from a Finnhub-style provider.

use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use vitals_core::model::StockQuote;

use crate::collector::SampleSource;

/// Pause between per-symbol requests to respect provider rate limits.
const REQUEST_GAP: Duration = Duration::from_secs(1);

/// Quote payload as returned by the provider: current price and previous
/// close. A missing field deserializes to 0.0, which the caller treats as
/// "no usable quote".
#[derive(Debug, Deserialize)]
struct ProviderQuote {
    #[serde(default)]
    c: f64,
    #[serde(default)]
    pc: f64,
}

pub struct StockSampler {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    symbols: Vec<String>,
}

impl StockSampler {
    pub fn new(base_url: String, api_key: String, symbols: Vec<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url,
            api_key,
            symbols,
        }
    }

    /// Fetches one symbol's quote. Failures are logged and skipped; there
    /// is no retry within the tick.
    fn fetch_quote(&self, symbol: &str) -> Option<StockQuote> {
        let url = format!(
            "{}/quote?symbol={}&token={}",
            self.base_url, symbol, self.api_key
        );
        let quote: ProviderQuote = match self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
        {
            Ok(quote) => quote,
            Err(e) => {
                warn!(symbol, error = %e, "quote fetch failed, skipping symbol");
                return None;
            }
        };

        if quote.c <= 0.0 {
            warn!(symbol, price = quote.c, "no usable price, skipping symbol");
            return None;
        }

        Some(StockQuote {
            symbol: symbol.to_string(),
            price: quote.c,
            change_percent: change_percent(quote.c, quote.pc),
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        })
    }
}

impl SampleSource for StockSampler {
    type Sample = Vec<StockQuote>;

    /// One batch per tick: every configured symbol in order, failed
    /// symbols skipped. None when every symbol failed.
    fn collect(&mut self) -> Option<Vec<StockQuote>> {
        let mut quotes = Vec::with_capacity(self.symbols.len());
        for (i, symbol) in self.symbols.iter().enumerate() {
            if i > 0 {
                thread::sleep(REQUEST_GAP);
            }
            if let Some(quote) = self.fetch_quote(symbol) {
                debug!(
                    symbol = %quote.symbol,
                    price = quote.price,
                    change = quote.change_percent,
                    "quote fetched"
                );
                quotes.push(quote);
            }
        }

        if quotes.is_empty() { None } else { Some(quotes) }
    }
}

/// Percentage change against previous close, rounded to 2 decimals.
/// Zero when there is no usable previous close.
fn change_percent(current: f64, previous_close: f64) -> f64 {
    if previous_close > 0.0 {
        ((current - previous_close) / previous_close * 100.0 * 100.0).round() / 100.0
    } else {
        0.0
    }
}
