//! Public market-data bucket source.
//!
//! Lists archive keys through the bucket's S3 listing endpoint, downloads
//! archives from the public download host, and discovers symbols through the
//! exchange-info endpoint of each asset class. Handles retries with exponential
//! backoff and the circuit breaker; everything above this layer only sees
//! `DumpError` values.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::circuit_breaker::CircuitBreaker;
use super::listing::parse_listing;
use super::provider::{ArchiveSource, SymbolInfo};
use crate::domain::AssetClass;
use crate::error::DumpError;

pub const DEFAULT_DOWNLOAD_BASE: &str = "https://data.binance.vision";
pub const DEFAULT_LISTING_BASE: &str =
    "https://s3-ap-northeast-1.amazonaws.com/data.binance.vision";

/// Connection settings for [`VisionSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    pub download_base: String,
    pub listing_base: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            listing_base: DEFAULT_LISTING_BASE.to_string(),
            timeout_secs: 120,
            max_retries: 3,
            base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeSymbol {
    symbol: String,
    #[serde(default)]
    quote_asset: String,
    #[serde(default)]
    status: Option<String>,
    /// COIN-M futures report `contractStatus` instead of `status`.
    #[serde(default)]
    contract_status: Option<String>,
}

fn exchange_info_url(asset_class: AssetClass) -> &'static str {
    match asset_class {
        AssetClass::Spot => "https://api.binance.com/api/v3/exchangeInfo",
        AssetClass::Um => "https://fapi.binance.com/fapi/v1/exchangeInfo",
        AssetClass::Cm => "https://dapi.binance.com/dapi/v1/exchangeInfo",
    }
}

/// Parse an exchange-info document into symbol descriptors.
pub fn parse_exchange_info(body: &str) -> Result<Vec<SymbolInfo>, DumpError> {
    let info: ExchangeInfo = serde_json::from_str(body)
        .map_err(|e| DumpError::ListingFormat(format!("exchange info: {e}")))?;
    Ok(info
        .symbols
        .into_iter()
        .map(|s| {
            let tradable = s
                .status
                .or(s.contract_status)
                .map(|st| st == "TRADING")
                .unwrap_or(true);
            SymbolInfo {
                symbol: s.symbol,
                quote_asset: s.quote_asset,
                tradable,
            }
        })
        .collect())
}

pub struct VisionSource {
    client: Client,
    settings: VisionSettings,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl VisionSource {
    pub fn new(
        settings: VisionSettings,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DumpError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("klinedump/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DumpError::TransportFailure(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            settings,
            circuit_breaker,
        })
    }

    /// Send a request with retry and circuit breaker logic, then read the body.
    ///
    /// `what` names the requested object in `RemoteNotFound` errors.
    fn request<T>(
        &self,
        what: &str,
        build: impl Fn() -> RequestBuilder,
        read: impl Fn(Response) -> reqwest::Result<T>,
    ) -> Result<T, DumpError> {
        let base_delay = Duration::from_millis(self.settings.base_delay_ms);
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                std::thread::sleep(base_delay * 2u32.pow(attempt - 1));
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DumpError::CircuitBreakerTripped);
            }

            let resp = match build().send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    tracing::debug!(attempt, error = %e, "request to {what} failed, retrying");
                    last_error = Some(DumpError::TransportFailure(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DumpError::TransportFailure(e.to_string())),
            };

            let status = resp.status();

            if status == StatusCode::NOT_FOUND {
                // The remote answered; absence is a normal outcome.
                self.circuit_breaker.record_success();
                return Err(DumpError::RemoteNotFound {
                    key: what.to_string(),
                });
            }

            if status == StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DumpError::CircuitBreakerTripped);
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                self.circuit_breaker.record_failure();
                if let Some(secs) = retry_after_secs(&resp) {
                    std::thread::sleep(Duration::from_secs(secs.min(60)));
                }
                last_error = Some(DumpError::TransportFailure(format!(
                    "HTTP {status} for {what}"
                )));
                continue;
            }

            if !status.is_success() {
                return Err(DumpError::TransportFailure(format!(
                    "HTTP {status} for {what}"
                )));
            }

            match read(resp) {
                Ok(body) => {
                    self.circuit_breaker.record_success();
                    return Ok(body);
                }
                Err(e) => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DumpError::TransportFailure(format!(
                        "reading body of {what}: {e}"
                    )));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DumpError::TransportFailure(format!("max retries exceeded for {what}"))
        }))
    }
}

fn retry_after_secs(resp: &Response) -> Option<u64> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

impl ArchiveSource for VisionSource {
    fn name(&self) -> &str {
        "data.binance.vision"
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, DumpError> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let body = self.request(
                prefix,
                || {
                    let mut query = vec![("delimiter", "/"), ("prefix", prefix)];
                    if let Some(m) = marker.as_deref() {
                        query.push(("marker", m));
                    }
                    self.client.get(&self.settings.listing_base).query(&query)
                },
                |resp| resp.text(),
            )?;

            let page = parse_listing(&body)?;
            let next = page.continuation().map(str::to_string);
            keys.extend(page.keys);

            match next {
                Some(m) if marker.as_deref() != Some(m.as_str()) => marker = Some(m),
                _ => break,
            }
        }

        tracing::debug!(prefix, count = keys.len(), "listed remote keys");
        Ok(keys)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, DumpError> {
        let url = format!("{}/{key}", self.settings.download_base.trim_end_matches('/'));
        tracing::debug!(%url, "downloading archive");
        self.request(key, || self.client.get(&url), |resp| {
            resp.bytes().map(|b| b.to_vec())
        })
    }

    fn list_symbols(&self, asset_class: AssetClass) -> Result<Vec<SymbolInfo>, DumpError> {
        let url = exchange_info_url(asset_class);
        let body = self.request(url, || self.client.get(url), |resp| resp.text())?;
        parse_exchange_info(&body)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_info_spot_shape() {
        let body = r#"{"timezone":"UTC","symbols":[
            {"symbol":"BTCUSDT","status":"TRADING","baseAsset":"BTC","quoteAsset":"USDT"},
            {"symbol":"LUNAUSDT","status":"BREAK","baseAsset":"LUNA","quoteAsset":"USDT"}
        ]}"#;
        let symbols = parse_exchange_info(body).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].quote_asset, "USDT");
        assert!(symbols[0].tradable);
        assert!(!symbols[1].tradable);
    }

    #[test]
    fn exchange_info_coin_m_shape() {
        let body = r#"{"symbols":[
            {"symbol":"BTCUSD_PERP","contractStatus":"TRADING","quoteAsset":"USD"}
        ]}"#;
        let symbols = parse_exchange_info(body).unwrap();
        assert!(symbols[0].tradable);
        assert_eq!(symbols[0].symbol, "BTCUSD_PERP");
    }

    #[test]
    fn exchange_info_rejects_non_json() {
        assert!(matches!(
            parse_exchange_info("<html/>"),
            Err(DumpError::ListingFormat(_))
        ));
    }

    #[test]
    fn default_settings_point_at_public_hosts() {
        let s = VisionSettings::default();
        assert_eq!(s.download_base, DEFAULT_DOWNLOAD_BASE);
        assert!(s.listing_base.ends_with("data.binance.vision"));
        assert!(s.max_retries > 0);
    }
}
