// =============================================================================
// HttpVenueClient — HMAC-SHA256 signed REST client for the Venue Port
// =============================================================================
//
// SECURITY: the secret key is never logged or serialized. Every signed call
// carries an X-SIGNATURE header and a millisecond timestamp to bound replay.
// =============================================================================

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};

use crate::types::{AccountRole, BalanceInfo, PositionSnapshot, Side, SymbolMeta};

use super::{ClearinghouseState, OrderRecord, TimeInForce, VenueError, VenuePort, VenueResult};

type HmacSha256 = Hmac<Sha256>;

/// Signed-request timeout, per spec §5 (writes get the longer budget).
const READ_TIMEOUT_SECS: u64 = 10;
const WRITE_TIMEOUT_SECS: u64 = 20;

#[derive(Clone)]
pub struct HttpVenueClient {
    api_key: String,
    secret: String,
    base_url: String,
    reads: reqwest::Client,
    writes: reqwest::Client,
}

impl HttpVenueClient {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>, base_url: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let secret = secret.into();

        let mut headers = HeaderMap::new();
        if let Ok(val) = HeaderValue::from_str(&api_key) {
            headers.insert("X-API-KEY", val);
        }

        let reads = reqwest::Client::builder()
            .default_headers(headers.clone())
            .timeout(std::time::Duration::from_secs(READ_TIMEOUT_SECS))
            .build()
            .expect("failed to build reqwest client");

        let writes = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(WRITE_TIMEOUT_SECS))
            .build()
            .expect("failed to build reqwest client");

        Self { api_key, secret, base_url: base_url.into(), reads, writes }
    }

    fn sign(&self, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_millis() as u64
    }

    async fn post_signed(&self, path: &str, mut payload: serde_json::Value) -> Result<serde_json::Value, VenueError> {
        let ts = Self::timestamp_ms();
        if let serde_json::Value::Object(ref mut map) = payload {
            map.insert("timestamp".to_string(), serde_json::json!(ts));
        }
        let body = serde_json::to_string(&payload)
            .map_err(|e| VenueError::Connectivity(e.to_string()))?;
        let signature = self.sign(&body);

        let resp = self
            .writes
            .post(format!("{}{}", self.base_url, path))
            .header("X-SIGNATURE", signature)
            .header("X-TIMESTAMP", ts.to_string())
            .body(body)
            .send()
            .await
            .map_err(|e| VenueError::Connectivity(e.to_string()))?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VenueError::Connectivity(e.to_string()))?;

        if !status.is_success() {
            return Err(VenueError::Rejected {
                code: status.to_string(),
                message: data.to_string(),
            });
        }

        Ok(data)
    }

    async fn post_public(&self, path: &str, payload: serde_json::Value) -> Result<serde_json::Value, VenueError> {
        let resp = self
            .reads
            .post(format!("{}{}", self.base_url, path))
            .json(&payload)
            .send()
            .await
            .map_err(|e| VenueError::Connectivity(e.to_string()))?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VenueError::Connectivity(e.to_string()))?;

        if !status.is_success() {
            return Err(VenueError::Connectivity(format!("{status}: {data}")));
        }

        Ok(data)
    }

    fn parse_venue_result(data: &serde_json::Value) -> VenueResult {
        if let Some(code) = data["error"]["code"].as_str() {
            return VenueResult::Rejected {
                code: code.to_string(),
                message: data["error"]["message"].as_str().unwrap_or_default().to_string(),
            };
        }
        if let Some(order_id) = data["resting"]["order_id"].as_str() {
            return VenueResult::Resting { order_id: order_id.to_string() };
        }
        if let Some(order_id) = data["filled"]["order_id"].as_str() {
            let avg_px = data["filled"]["avg_px"]
                .as_str()
                .and_then(|s| s.parse::<Decimal>().ok())
                .unwrap_or_default();
            let size = data["filled"]["size"]
                .as_str()
                .and_then(|s| s.parse::<Decimal>().ok())
                .unwrap_or_default();
            return VenueResult::Filled { order_id: order_id.to_string(), avg_px, size };
        }
        VenueResult::Rejected {
            code: "UNRECOGNIZED_RESPONSE".to_string(),
            message: data.to_string(),
        }
    }
}

#[async_trait]
impl VenuePort for HttpVenueClient {
    #[instrument(skip(self), name = "venue::user_role")]
    async fn user_role(&self, addr: &str) -> Result<AccountRole, VenueError> {
        let payload = serde_json::json!({ "type": "userRole", "user": addr });
        let data = self.post_public("/info", payload).await?;

        match data["role"].as_str() {
            Some("agent") => {
                let master = data["master"].as_str().unwrap_or_default().to_string();
                Ok(AccountRole::Agent { master_addr: master })
            }
            Some("master") => Ok(AccountRole::Master),
            _ => Err(VenueError::Rejected {
                code: "UNKNOWN_ROLE".to_string(),
                message: format!("could not resolve role for {addr}"),
            }),
        }
    }

    #[instrument(skip(self), name = "venue::clearinghouse_state")]
    async fn clearinghouse_state(&self, addr: &str) -> Result<ClearinghouseState, VenueError> {
        let payload = serde_json::json!({ "type": "clearinghouseState", "user": addr });
        let data = self.post_public("/info", payload).await?;

        let perp_equity = data["marginSummary"]["accountValue"]
            .as_str()
            .and_then(|s| s.parse::<Decimal>().ok())
            .unwrap_or_default();
        let margin_used = data["marginSummary"]["totalMarginUsed"]
            .as_str()
            .and_then(|s| s.parse::<Decimal>().ok())
            .unwrap_or_default();

        let mut positions = HashMap::new();
        if let Some(arr) = data["assetPositions"].as_array() {
            for entry in arr {
                let symbol = match entry["position"]["coin"].as_str() {
                    Some(s) => s.to_string(),
                    None => continue,
                };
                let size = entry["position"]["szi"]
                    .as_str()
                    .and_then(|s| s.parse::<Decimal>().ok())
                    .unwrap_or_default();
                let entry_px = entry["position"]["entryPx"]
                    .as_str()
                    .and_then(|s| s.parse::<Decimal>().ok())
                    .unwrap_or_default();
                positions.insert(symbol, PositionSnapshot { size, entry_px });
            }
        }

        debug!(addr, perp_equity = %perp_equity, "clearinghouse state retrieved");
        Ok(ClearinghouseState { perp_equity, margin_used, positions })
    }

    #[instrument(skip(self), name = "venue::spot_state")]
    async fn spot_state(&self, addr: &str) -> Result<Vec<BalanceInfo>, VenueError> {
        let payload = serde_json::json!({ "type": "spotClearinghouseState", "user": addr });
        let data = self.post_public("/info", payload).await?;

        let mut balances = Vec::new();
        if let Some(arr) = data["balances"].as_array() {
            for entry in arr {
                let asset = entry["coin"].as_str().unwrap_or_default().to_string();
                let free = entry["total"]
                    .as_str()
                    .and_then(|s| s.parse::<Decimal>().ok())
                    .unwrap_or_default();
                let locked = entry["hold"]
                    .as_str()
                    .and_then(|s| s.parse::<Decimal>().ok())
                    .unwrap_or_default();
                balances.push(BalanceInfo { asset, free, locked });
            }
        }
        Ok(balances)
    }

    #[instrument(skip(self), name = "venue::symbol_meta")]
    async fn symbol_meta(&self) -> Result<HashMap<String, SymbolMeta>, VenueError> {
        let payload = serde_json::json!({ "type": "meta" });
        let data = self.post_public("/info", payload).await?;

        const MAX_PRICE_DECIMALS: i32 = 6;
        let mut out = HashMap::new();
        if let Some(universe) = data["universe"].as_array() {
            for asset in universe {
                let name = match asset["name"].as_str() {
                    Some(n) => n.to_string(),
                    None => continue,
                };
                let sz_decimals = asset["szDecimals"].as_u64().unwrap_or(0) as u32;
                let price_decimals = (MAX_PRICE_DECIMALS - sz_decimals as i32).max(0) as u32;
                let tick_size = Decimal::new(1, price_decimals);
                out.insert(name, SymbolMeta { sz_decimals, tick_size });
            }
        }
        debug!(count = out.len(), "symbol metadata refreshed");
        Ok(out)
    }

    #[instrument(skip(self), name = "venue::market_open")]
    async fn market_open(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        reduce_only: bool,
    ) -> Result<VenueResult, VenueError> {
        let payload = serde_json::json!({
            "type": "order",
            "coin": symbol,
            "side": side.to_string(),
            "size": size.to_string(),
            "order_type": { "market": {} },
            "reduce_only": reduce_only,
        });
        let data = self.post_signed("/exchange", payload).await?;
        Ok(Self::parse_venue_result(&data))
    }

    #[instrument(skip(self), name = "venue::market_close")]
    async fn market_close(&self, symbol: &str) -> Result<Option<VenueResult>, VenueError> {
        let payload = serde_json::json!({ "type": "marketClose", "coin": symbol });
        let data = self.post_signed("/exchange", payload).await?;

        if data.is_null() {
            warn!(symbol, "market_close returned a null response");
            return Ok(None);
        }

        Ok(Some(Self::parse_venue_result(&data)))
    }

    #[instrument(skip(self), name = "venue::limit_order")]
    async fn limit_order(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        px: Decimal,
        tif: TimeInForce,
    ) -> Result<VenueResult, VenueError> {
        let tif_str = match tif {
            TimeInForce::Gtc => "Gtc",
        };
        let payload = serde_json::json!({
            "type": "order",
            "coin": symbol,
            "side": side.to_string(),
            "size": size.to_string(),
            "order_type": { "limit": { "tif": tif_str } },
            "price": px.to_string(),
            "reduce_only": false,
        });
        let data = self.post_signed("/exchange", payload).await?;
        Ok(Self::parse_venue_result(&data))
    }

    #[instrument(skip(self), name = "venue::trigger_order")]
    async fn trigger_order(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        trigger_px: Decimal,
        is_market: bool,
    ) -> Result<VenueResult, VenueError> {
        let payload = serde_json::json!({
            "type": "order",
            "coin": symbol,
            "side": side.to_string(),
            "size": size.to_string(),
            "order_type": {
                "trigger": {
                    "trigger_px": trigger_px.to_string(),
                    "is_market": is_market,
                }
            },
            "reduce_only": true,
        });
        let data = self.post_signed("/exchange", payload).await?;
        Ok(Self::parse_venue_result(&data))
    }

    #[instrument(skip(self), name = "venue::open_orders")]
    async fn open_orders(&self, addr: &str) -> Result<Vec<OrderRecord>, VenueError> {
        let payload = serde_json::json!({ "type": "openOrders", "user": addr });
        let data = self.post_public("/info", payload).await?;
        Ok(Self::parse_order_records(&data))
    }

    #[instrument(skip(self), name = "venue::order_history")]
    async fn order_history(&self, addr: &str) -> Result<Vec<OrderRecord>, VenueError> {
        let payload = serde_json::json!({ "type": "orderHistory", "user": addr });
        let data = self.post_public("/info", payload).await?;
        Ok(Self::parse_order_records(&data))
    }
}

impl HttpVenueClient {
    fn parse_order_records(data: &serde_json::Value) -> Vec<OrderRecord> {
        let mut out = Vec::new();
        if let Some(arr) = data.as_array() {
            for entry in arr {
                let order_id = entry["oid"].as_str().unwrap_or_default().to_string();
                let symbol = entry["coin"].as_str().unwrap_or_default().to_string();
                let side = match entry["side"].as_str() {
                    Some("sell") => Side::Sell,
                    _ => Side::Buy,
                };
                let size = entry["sz"]
                    .as_str()
                    .and_then(|s| s.parse::<Decimal>().ok())
                    .unwrap_or_default();
                let price = entry["limitPx"]
                    .as_str()
                    .and_then(|s| s.parse::<Decimal>().ok())
                    .unwrap_or_default();
                let status = entry["status"].as_str().unwrap_or("unknown").to_string();
                out.push(OrderRecord { order_id, symbol, side, size, price, status });
            }
        }
        out
    }
}

impl std::fmt::Debug for HttpVenueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpVenueClient")
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
