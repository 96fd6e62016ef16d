// =============================================================================
// FakeVenue — in-memory scriptable double for Execution Engine tests
// =============================================================================

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{AccountRole, BalanceInfo, PositionSnapshot, Side, SymbolMeta};

use super::{ClearinghouseState, OrderRecord, TimeInForce, VenueError, VenuePort, VenueResult};

/// One call the fake observed, recorded in invocation order for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    MarketOpen { symbol: String, side: Side, size: Decimal, reduce_only: bool },
    MarketClose { symbol: String },
    LimitOrder { symbol: String, side: Side, size: Decimal, px: Decimal },
    TriggerOrder { symbol: String, side: Side, size: Decimal, trigger_px: Decimal, is_market: bool },
}

pub struct FakeVenue {
    positions: Mutex<HashMap<String, PositionSnapshot>>,
    meta: HashMap<String, SymbolMeta>,
    market_close_script: Mutex<VecDeque<Option<VenueResult>>>,
    calls: Mutex<Vec<RecordedCall>>,
    next_order_id: AtomicU64,
}

impl FakeVenue {
    pub fn new(meta: HashMap<String, SymbolMeta>) -> Self {
        Self {
            positions: Mutex::new(HashMap::new()),
            meta,
            market_close_script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            next_order_id: AtomicU64::new(1),
        }
    }

    pub fn set_position(&self, symbol: &str, size: Decimal, entry_px: Decimal) {
        self.positions.lock().insert(symbol.to_string(), PositionSnapshot { size, entry_px });
    }

    /// Queue the next `market_close` outcome. Consumed FIFO; once the queue is
    /// empty, calls fall back to an ordinary `Filled` flattening.
    pub fn script_market_close(&self, outcome: Option<VenueResult>) {
        self.market_close_script.lock().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    fn next_id(&self) -> String {
        format!("fake-{}", self.next_order_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl VenuePort for FakeVenue {
    async fn user_role(&self, _addr: &str) -> Result<AccountRole, VenueError> {
        Ok(AccountRole::Master)
    }

    async fn clearinghouse_state(&self, _addr: &str) -> Result<ClearinghouseState, VenueError> {
        Ok(ClearinghouseState {
            perp_equity: Decimal::ZERO,
            margin_used: Decimal::ZERO,
            positions: self.positions.lock().clone(),
        })
    }

    async fn spot_state(&self, _addr: &str) -> Result<Vec<BalanceInfo>, VenueError> {
        Ok(Vec::new())
    }

    async fn symbol_meta(&self) -> Result<HashMap<String, SymbolMeta>, VenueError> {
        Ok(self.meta.clone())
    }

    async fn market_open(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        reduce_only: bool,
    ) -> Result<VenueResult, VenueError> {
        self.calls.lock().push(RecordedCall::MarketOpen {
            symbol: symbol.to_string(),
            side,
            size,
            reduce_only,
        });

        let signed = match side {
            Side::Buy => size,
            Side::Sell => -size,
        };
        let mut positions = self.positions.lock();
        let entry = positions.entry(symbol.to_string()).or_insert(PositionSnapshot {
            size: Decimal::ZERO,
            entry_px: Decimal::ZERO,
        });
        entry.size += signed;

        Ok(VenueResult::Filled { order_id: self.next_id(), avg_px: Decimal::ZERO, size })
    }

    async fn market_close(&self, symbol: &str) -> Result<Option<VenueResult>, VenueError> {
        self.calls.lock().push(RecordedCall::MarketClose { symbol: symbol.to_string() });

        let scripted = self.market_close_script.lock().pop_front();
        if let Some(outcome) = scripted {
            if !matches!(outcome, Some(VenueResult::Rejected { .. }) | None) {
                self.positions.lock().remove(symbol);
            }
            return Ok(outcome);
        }

        let size = self.positions.lock().get(symbol).map(|p| p.size).unwrap_or_default();
        self.positions.lock().remove(symbol);
        Ok(Some(VenueResult::Filled {
            order_id: self.next_id(),
            avg_px: Decimal::ZERO,
            size: size.abs(),
        }))
    }

    async fn limit_order(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        px: Decimal,
        _tif: TimeInForce,
    ) -> Result<VenueResult, VenueError> {
        self.calls.lock().push(RecordedCall::LimitOrder {
            symbol: symbol.to_string(),
            side,
            size,
            px,
        });
        Ok(VenueResult::Resting { order_id: self.next_id() })
    }

    async fn trigger_order(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        trigger_px: Decimal,
        is_market: bool,
    ) -> Result<VenueResult, VenueError> {
        self.calls.lock().push(RecordedCall::TriggerOrder {
            symbol: symbol.to_string(),
            side,
            size,
            trigger_px,
            is_market,
        });
        Ok(VenueResult::Resting { order_id: self.next_id() })
    }

    async fn open_orders(&self, _addr: &str) -> Result<Vec<OrderRecord>, VenueError> {
        Ok(Vec::new())
    }

    async fn order_history(&self, _addr: &str) -> Result<Vec<OrderRecord>, VenueError> {
        Ok(Vec::new())
    }
}
