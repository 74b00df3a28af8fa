//! Binance spot REST connector.
//!
//! Public endpoints (exchange info, klines, ticker) need no credentials;
//! account and order endpoints are signed with HMAC-SHA256 over the query
//! string. Idempotent GETs retry with exponential backoff behind the circuit
//! breaker. Order POSTs are sent exactly once.

use super::circuit_breaker::CircuitBreaker;
use super::{Balances, Exchange, ExchangeError};
use crate::domain::{Bar, MarketInfo, OrderReceipt, OrderSide, TradingPair};
use crate::timeframe::Timeframe;
use hmac::{Hmac, Mac};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const API_KEY_VAR: &str = "BINANCE_API_KEY";
const SECRET_KEY_VAR: &str = "BINANCE_SECRET_KEY";

/// API key pair, redacted in debug output.
#[derive(Debug)]
pub struct Credentials {
    api_key: SecretString,
    secret_key: SecretString,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into().into()),
            secret_key: SecretString::new(secret_key.into().into()),
        }
    }

    /// Read `BINANCE_API_KEY` and `BINANCE_SECRET_KEY`.
    pub fn from_env() -> Result<Self, ExchangeError> {
        let read = |var: &str| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    ExchangeError::Authentication(format!("environment variable {var} is not set"))
                })
        };
        Ok(Self::new(read(API_KEY_VAR)?, read(SECRET_KEY_VAR)?))
    }

    /// Hex HMAC-SHA256 signature of `payload`.
    pub fn sign(&self, payload: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.expose_secret().as_bytes())
            .map_err(|e| ExchangeError::Authentication(format!("invalid secret key: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    pub base_url: String,
    pub recv_window_ms: u64,
    pub timeout_secs: u64,
    /// Retries for idempotent GET requests.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".into(),
            recv_window_ms: 5_000,
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    base_asset: String,
    quote_asset: String,
    #[serde(default)]
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolFilter {
    filter_type: String,
    min_qty: Option<String>,
    step_size: Option<String>,
    min_notional: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    status: String,
    executed_qty: String,
    cummulative_quote_qty: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

fn parse_num(field: &str, value: &str) -> Result<f64, ExchangeError> {
    value
        .parse::<f64>()
        .map_err(|_| ExchangeError::ResponseFormat(format!("{field}: not a number: {value:?}")))
}

/// Positive numeric filter value, or None when absent/zero.
fn parse_limit(value: Option<&String>) -> Result<Option<f64>, ExchangeError> {
    match value {
        None => Ok(None),
        Some(v) => Ok(Some(parse_num("filter", v)?).filter(|x| *x > 0.0)),
    }
}

fn market_from_symbol(info: &SymbolInfo) -> Result<MarketInfo, ExchangeError> {
    let mut market = MarketInfo::unrestricted(TradingPair::new(&info.base_asset, &info.quote_asset));
    for filter in &info.filters {
        match filter.filter_type.as_str() {
            "LOT_SIZE" => {
                market.min_amount = parse_limit(filter.min_qty.as_ref())?;
                market.amount_step = parse_limit(filter.step_size.as_ref())?;
            }
            "MIN_NOTIONAL" | "NOTIONAL" => {
                if let Some(min) = parse_limit(filter.min_notional.as_ref())? {
                    market.min_cost = Some(market.min_cost.map_or(min, |m: f64| m.max(min)));
                }
            }
            _ => {}
        }
    }
    Ok(market)
}

/// Kline row: `[open_time, open, high, low, close, volume, close_time, ...]`.
fn parse_kline(row: &[serde_json::Value]) -> Result<Bar, ExchangeError> {
    let bad = |what: &str| ExchangeError::ResponseFormat(format!("kline {what}: {row:?}"));
    let open_time = row.first().and_then(|v| v.as_i64()).ok_or_else(|| bad("open time"))?;
    let field = |i: usize, name: &str| -> Result<f64, ExchangeError> {
        let raw = row.get(i).and_then(|v| v.as_str()).ok_or_else(|| bad(name))?;
        parse_num(name, raw)
    };
    let timestamp = chrono::DateTime::from_timestamp_millis(open_time)
        .ok_or_else(|| bad("timestamp range"))?;
    Ok(Bar {
        timestamp,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: field(5, "volume")?,
    })
}

/// Map a non-success response body to a structured error.
fn api_error(status: StatusCode, body: &str) -> ExchangeError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => match err.code {
            -2014 | -2015 | -1022 => ExchangeError::Authentication(err.msg),
            -1121 => ExchangeError::SymbolNotFound { symbol: err.msg },
            code => ExchangeError::Rejected {
                code,
                message: err.msg,
            },
        },
        Err(_) => ExchangeError::Rejected {
            code: i64::from(status.as_u16()),
            message: body.chars().take(200).collect(),
        },
    }
}

/// Decimal places implied by a lot step (0.01 → 2, 1 → 0).
fn step_decimals(step: f64) -> usize {
    if step >= 1.0 {
        0
    } else {
        (-step.log10()).round().max(0.0) as usize
    }
}

/// Format a base amount for the order endpoint.
pub fn format_amount(amount: f64, step: Option<f64>) -> String {
    match step {
        Some(step) if step > 0.0 => format!("{:.*}", step_decimals(step), amount),
        _ => {
            let s = format!("{amount:.8}");
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
    }
}

fn query_string(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Binance spot client.
pub struct BinanceClient {
    http: Client,
    config: BinanceConfig,
    credentials: Option<Credentials>,
    circuit_breaker: Arc<CircuitBreaker>,
    markets: HashMap<String, MarketInfo>,
    market_order: Vec<TradingPair>,
}

impl BinanceClient {
    pub fn new(
        config: BinanceConfig,
        credentials: Option<Credentials>,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            credentials,
            circuit_breaker,
            markets: HashMap::new(),
            market_order: Vec::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn credentials(&self) -> Result<&Credentials, ExchangeError> {
        self.credentials.as_ref().ok_or_else(|| {
            ExchangeError::Authentication("this endpoint requires API credentials".into())
        })
    }

    /// Attach timestamp, recvWindow, signature and API key header.
    fn signed(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<RequestBuilder, ExchangeError> {
        let creds = self.credentials()?;
        params.push(("recvWindow", self.config.recv_window_ms.to_string()));
        params.push(("timestamp", chrono::Utc::now().timestamp_millis().to_string()));
        let query = query_string(&params);
        let signature = creds.sign(&query)?;
        let url = format!("{}?{query}&signature={signature}", self.url(path));
        Ok(self
            .http
            .request(method, url)
            .header("X-MBX-APIKEY", creds.api_key.expose_secret()))
    }

    /// Send one request and decode the JSON body.
    fn send_once<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ExchangeError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(ExchangeError::CircuitBreakerTripped);
        }

        let resp = request
            .send()
            .map_err(|e| ExchangeError::Network(e.to_string()))?;
        let status = resp.status();

        if status == StatusCode::IM_A_TEAPOT || status == StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(ExchangeError::CircuitBreakerTripped);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ExchangeError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status.is_server_error() {
            self.circuit_breaker.record_failure();
            return Err(ExchangeError::Network(format!("HTTP {status}")));
        }

        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let decoded = resp
            .json::<T>()
            .map_err(|e| ExchangeError::ResponseFormat(e.to_string()))?;
        self.circuit_breaker.record_success();
        Ok(decoded)
    }

    /// Retry network-kind failures with exponential backoff.
    fn get_with_retry<T: DeserializeOwned>(
        &self,
        build: impl Fn() -> Result<RequestBuilder, ExchangeError>,
    ) -> Result<T, ExchangeError> {
        let base = Duration::from_millis(self.config.retry_base_delay_ms);
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                std::thread::sleep(base * 2u32.pow(attempt - 1));
            }
            match self.send_once(build()?) {
                Ok(value) => return Ok(value),
                Err(ExchangeError::CircuitBreakerTripped) => {
                    return Err(ExchangeError::CircuitBreakerTripped)
                }
                Err(e) if e.is_network() => {
                    tracing::debug!(attempt, error = %e, "request failed, retrying");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ExchangeError::Network("max retries exceeded".into())))
    }

    fn place_order(
        &mut self,
        pair: &TradingPair,
        side: OrderSide,
        amount: f64,
    ) -> Result<OrderReceipt, ExchangeError> {
        let market = self.market(pair)?;
        let quantity = format_amount(market.round_amount_down(amount), market.amount_step);
        let params = vec![
            ("symbol", pair.concatenated()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity),
            ("newOrderRespType", "FULL".to_string()),
        ];
        let request = self.signed(Method::POST, "/api/v3/order", params)?;
        let resp: OrderResponse = self.send_once(request)?;

        let executed = parse_num("executedQty", &resp.executed_qty)?;
        let quote = parse_num("cummulativeQuoteQty", &resp.cummulative_quote_qty)?;
        Ok(OrderReceipt {
            order_id: resp.order_id.to_string(),
            pair: pair.clone(),
            side,
            amount: executed,
            average_price: (executed > 0.0).then(|| quote / executed),
            status: resp.status,
        })
    }
}

impl Exchange for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    fn load_markets(&mut self) -> Result<(), ExchangeError> {
        let url = self.url("/api/v3/exchangeInfo");
        let info: ExchangeInfoResponse = self.get_with_retry(|| Ok(self.http.get(&url)))?;

        self.markets.clear();
        self.market_order.clear();
        for symbol in &info.symbols {
            let market = market_from_symbol(symbol)?;
            self.market_order.push(market.pair.clone());
            self.markets.insert(symbol.symbol.clone(), market);
        }
        tracing::info!(markets = self.markets.len(), "binance markets loaded");
        Ok(())
    }

    fn market(&self, pair: &TradingPair) -> Result<MarketInfo, ExchangeError> {
        if self.markets.is_empty() {
            return Err(ExchangeError::MarketsNotLoaded);
        }
        self.markets
            .get(&pair.concatenated())
            .cloned()
            .ok_or_else(|| ExchangeError::SymbolNotFound {
                symbol: pair.to_string(),
            })
    }

    fn symbols(&self) -> Vec<TradingPair> {
        self.market_order.clone()
    }

    fn fetch_ohlcv(
        &self,
        pair: &TradingPair,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, ExchangeError> {
        let url = self.url("/api/v3/klines");
        let query = [
            ("symbol", pair.concatenated()),
            ("interval", timeframe.to_string()),
            ("limit", limit.to_string()),
        ];
        let rows: Vec<Vec<serde_json::Value>> =
            self.get_with_retry(|| Ok(self.http.get(&url).query(&query)))?;
        rows.iter().map(|row| parse_kline(row)).collect()
    }

    fn fetch_ticker(&self, pair: &TradingPair) -> Result<f64, ExchangeError> {
        let url = self.url("/api/v3/ticker/price");
        let query = [("symbol", pair.concatenated())];
        let ticker: TickerPrice = self.get_with_retry(|| Ok(self.http.get(&url).query(&query)))?;
        parse_num("price", &ticker.price)
    }

    fn fetch_balance(&self) -> Result<Balances, ExchangeError> {
        let account: AccountResponse =
            self.get_with_retry(|| self.signed(Method::GET, "/api/v3/account", Vec::new()))?;

        let mut balances = Balances::new();
        for b in account.balances {
            let total = parse_num("free", &b.free)? + parse_num("locked", &b.locked)?;
            balances.insert(b.asset, total);
        }
        Ok(balances)
    }

    fn market_buy(
        &mut self,
        pair: &TradingPair,
        amount: f64,
    ) -> Result<OrderReceipt, ExchangeError> {
        self.place_order(pair, OrderSide::Buy, amount)
    }

    fn market_sell(
        &mut self,
        pair: &TradingPair,
        amount: f64,
    ) -> Result<OrderReceipt, ExchangeError> {
        self.place_order(pair, OrderSide::Sell, amount)
    }
}
