//! USD price fetching from the CoinMarketCap quotes API.

use crate::error::{ExporterError, UpstreamError};
use serde::Deserialize;
use std::{collections::HashMap, future::Future, time::Duration};

/// CoinMarketCap quotes endpoint.
const QUOTES_URL: &str = "https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest";

/// Header carrying the API key.
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// Bound on a single quote request, so a hung upstream can only delay one
/// cycle by this much.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the monitored token's current USD price.
pub trait PriceSource: Send + Sync {
    /// Fetches the current USD price. No internal retry.
    fn fetch_usd(&self) -> impl Future<Output = Result<f64, ExporterError>> + Send;
}

/// Response from the quotes endpoint, keyed by symbol and then by quote
/// currency.
#[derive(Debug, Deserialize)]
struct QuotesResponse {
    data: HashMap<String, TokenQuotes>,
}

#[derive(Debug, Deserialize)]
struct TokenQuotes {
    quote: HashMap<String, CurrencyQuote>,
}

#[derive(Debug, Deserialize)]
struct CurrencyQuote {
    price: Option<f64>,
}

/// CoinMarketCap price fetcher client.
#[derive(Debug, Clone)]
pub struct CoinMarketCap {
    /// HTTP client with a bounded request timeout.
    client: reqwest::Client,
    /// API key sent with every request.
    api_key: String,
    /// Symbol to quote, e.g. "MON".
    symbol: String,
}

impl CoinMarketCap {
    /// Creates a fetcher for the given API key and token symbol.
    pub fn new(api_key: String, symbol: String) -> Result<Self, ExporterError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(UpstreamError::Http)?;
        Ok(Self { client, api_key, symbol })
    }

    /// Extracts the USD price for `symbol` from a quotes response.
    fn extract_price(response: QuotesResponse, symbol: &str) -> Result<f64, UpstreamError> {
        let price = response
            .data
            .get(symbol)
            .and_then(|token| token.quote.get("USD"))
            .and_then(|quote| quote.price)
            .ok_or_else(|| UpstreamError::MissingQuote(symbol.to_string()))?;

        if !price.is_finite() || price < 0.0 {
            return Err(UpstreamError::InvalidPrice(price));
        }

        Ok(price)
    }
}

impl PriceSource for CoinMarketCap {
    async fn fetch_usd(&self) -> Result<f64, ExporterError> {
        let response = self
            .client
            .get(QUOTES_URL)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("symbol", self.symbol.as_str()), ("convert", "USD")])
            .send()
            .await
            .map_err(UpstreamError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status).into());
        }

        let quotes: QuotesResponse = response.json().await.map_err(UpstreamError::Http)?;
        Ok(Self::extract_price(quotes, &self.symbol)?)
    }
}
