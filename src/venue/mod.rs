// =============================================================================
// Venue Port — narrow adapter over the exchange API
// =============================================================================
//
// Everything the Execution Engine knows about the exchange goes through this
// trait. Two implementations exist: `HttpVenueClient`, the production
// HMAC-signed REST client, and `fake::FakeVenue`, a scriptable in-memory
// double used by the execution-engine tests.
// =============================================================================

pub mod client;
#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::types::{AccountRole, BalanceInfo, PositionSnapshot, Side, SymbolMeta};

/// Outcome of a venue order call. A null/absent response from `market_close`
/// is represented at the call site as `Ok(None)`, distinct from both
/// `Filled`/`Resting` and `Rejected` — see `VenuePort::market_close`.
#[derive(Debug, Clone, PartialEq)]
pub enum VenueResult {
    Filled { order_id: String, avg_px: Decimal, size: Decimal },
    Resting { order_id: String },
    Rejected { code: String, message: String },
}

impl VenueResult {
    pub fn is_rejected(&self) -> bool {
        matches!(self, VenueResult::Rejected { .. })
    }
}

/// Perp account state: equity, margin summary, and open positions by symbol.
#[derive(Debug, Clone)]
pub struct ClearinghouseState {
    pub perp_equity: Decimal,
    pub margin_used: Decimal,
    pub positions: HashMap<String, PositionSnapshot>,
}

/// Time-in-force for resting limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    Gtc,
}

/// A historical or currently-open order, returned by the pass-through query
/// endpoints (`GET /orders/open`, `GET /orders/history`).
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub size: Decimal,
    pub price: Decimal,
    pub status: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VenueError {
    #[error("connectivity error: {0}")]
    Connectivity(String),
    #[error("rejected: {code} {message}")]
    Rejected { code: String, message: String },
}

#[async_trait]
pub trait VenuePort: Send + Sync {
    async fn user_role(&self, addr: &str) -> Result<AccountRole, VenueError>;

    async fn clearinghouse_state(&self, addr: &str) -> Result<ClearinghouseState, VenueError>;

    async fn spot_state(&self, addr: &str) -> Result<Vec<BalanceInfo>, VenueError>;

    async fn symbol_meta(&self) -> Result<HashMap<String, SymbolMeta>, VenueError>;

    /// `reduce_only` must be `true` for the reversal flatten-fallback path
    /// (spec's flatten-fallback step) and `false` for a fresh entry.
    async fn market_open(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        reduce_only: bool,
    ) -> Result<VenueResult, VenueError>;

    /// Venue-provided flattening of the entire position on `symbol`.
    ///
    /// `Ok(None)` is a distinct, explicit outcome — the venue accepted the
    /// request but returned a null/absent body. Callers must not treat this
    /// the same as `Rejected`; see `execution::ExecutionEngine`.
    async fn market_close(&self, symbol: &str) -> Result<Option<VenueResult>, VenueError>;

    async fn limit_order(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        px: Decimal,
        tif: TimeInForce,
    ) -> Result<VenueResult, VenueError>;

    /// Reduce-only conditional order. `is_market` selects a market-on-trigger
    /// fill versus a resting limit once triggered.
    async fn trigger_order(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        trigger_px: Decimal,
        is_market: bool,
    ) -> Result<VenueResult, VenueError>;

    async fn open_orders(&self, addr: &str) -> Result<Vec<OrderRecord>, VenueError>;

    async fn order_history(&self, addr: &str) -> Result<Vec<OrderRecord>, VenueError>;
}
