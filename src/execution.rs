// =============================================================================
// Execution Engine (C8) — the signal-to-orders state machine
// =============================================================================
//
// START -> INSPECT_POSITION -> DECIDE -> (ENTER | FLATTEN -> FLATTEN_WAIT ->
// [ENTER | FLATTEN_FALLBACK -> ENTER]) -> ENTER_WAIT -> ATTACH_STOP ->
// ATTACH_TP1..TP4 -> DONE_OK/DONE_PARTIAL/DONE_FAIL.
//
// Never rolls back an already-accepted venue side effect. Every venue call
// produces exactly one record here, which the caller journals as a
// VenueResponse entry.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::error::EngineError;
use crate::precision::{format_price, format_trigger_price, truncate_size};
use crate::types::{EntryType, PositionSnapshot, Side, Signal, SymbolMeta};
use crate::venue::{TimeInForce, VenuePort, VenueResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    DoneOk,
    DonePartial,
    DoneFail,
}

impl Terminal {
    pub fn is_success(self) -> bool {
        matches!(self, Terminal::DoneOk | Terminal::DonePartial)
    }
}

#[derive(Debug, Clone)]
pub struct VenueCallRecord {
    pub order_kind: String,
    pub payload: serde_json::Value,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub terminal: Terminal,
    pub calls: Vec<VenueCallRecord>,
    pub reason: Option<String>,
}

fn status_of(result: &VenueResult) -> &'static str {
    match result {
        VenueResult::Filled { .. } => "filled",
        VenueResult::Resting { .. } => "resting",
        VenueResult::Rejected { .. } => "rejected",
    }
}

fn payload_of(result: &VenueResult) -> serde_json::Value {
    match result {
        VenueResult::Filled { order_id, avg_px, size } => {
            serde_json::json!({ "order_id": order_id, "avg_px": avg_px.to_string(), "size": size.to_string() })
        }
        VenueResult::Resting { order_id } => serde_json::json!({ "order_id": order_id }),
        VenueResult::Rejected { code, message } => serde_json::json!({ "code": code, "message": message }),
    }
}

pub struct ExecutionEngine {
    venue: Arc<dyn VenuePort>,
    meta_cache: RwLock<HashMap<String, SymbolMeta>>,
}

impl ExecutionEngine {
    pub fn new(venue: Arc<dyn VenuePort>) -> Self {
        Self { venue, meta_cache: RwLock::new(HashMap::new()) }
    }

    async fn symbol_meta(&self, symbol: &str) -> Result<SymbolMeta, EngineError> {
        if let Some(meta) = self.meta_cache.read().get(symbol).copied() {
            return Ok(meta);
        }
        let all = self
            .venue
            .symbol_meta()
            .await
            .map_err(|e| EngineError::Connectivity(e.to_string()))?;
        *self.meta_cache.write() = all.clone();
        all.get(symbol)
            .copied()
            .ok_or_else(|| EngineError::InvalidSignal(format!("unknown symbol '{symbol}'")))
    }

    #[instrument(skip(self, signal), fields(symbol = %signal.symbol, side = %signal.side))]
    pub async fn execute(&self, signal: &Signal, master_addr: &str) -> Result<ExecutionReport, EngineError> {
        let mut calls = Vec::new();

        if signal.quantity.is_sign_negative() {
            return Err(EngineError::InvalidSignal("quantity must be a positive decimal".to_string()));
        }
        if signal.entry == EntryType::Limit && signal.price.is_none() {
            return Err(EngineError::InvalidSignal("entry=limit requires a price".to_string()));
        }

        let meta = self.symbol_meta(&signal.symbol).await?;
        let entry_size = truncate_size(&meta, signal.quantity);
        if entry_size.is_zero() {
            return Err(EngineError::InvalidSignal(
                "quantity truncates to zero at this symbol's precision".to_string(),
            ));
        }

        let position = self.inspect_position(&signal.symbol, master_addr).await?;

        let opposing = match position.side() {
            Some(pos_side) => pos_side != signal.side,
            None => false,
        };

        if opposing {
            if let Some(fail) = self.flatten(&signal.symbol, signal.side, position, &mut calls).await? {
                return Ok(fail);
            }
        }

        let entry_result = self
            .enter(&signal.symbol, signal.side, signal.entry, entry_size, signal.price, &meta, &mut calls)
            .await?;

        if entry_result.is_rejected() {
            return Ok(ExecutionReport {
                terminal: Terminal::DoneFail,
                calls,
                reason: Some("entry order rejected".to_string()),
            });
        }

        let mut partial = false;

        if let Some(stop) = signal.stop {
            let stop_px = format_trigger_price(&meta, stop, signal.side);
            let result = self
                .place_trigger(&signal.symbol, signal.side.opposite(), entry_size, stop_px, true, "stop", &mut calls)
                .await?;
            if result.is_rejected() {
                partial = true;
            }
        }

        let tp_sizes = Self::allocate_tp_sizes(&signal.tps, entry_size, &meta);
        for (idx, size) in tp_sizes.iter().enumerate() {
            let level = &signal.tps[idx];
            let Some(price) = level.price else { continue };
            if size.is_zero() {
                continue;
            }
            let trigger_px = format_trigger_price(&meta, price, signal.side);
            let order_kind = format!("tp{}", idx + 1);
            let result = self
                .place_trigger(&signal.symbol, signal.side.opposite(), *size, trigger_px, true, &order_kind, &mut calls)
                .await?;
            if result.is_rejected() {
                partial = true;
            }
        }

        let terminal = if partial { Terminal::DonePartial } else { Terminal::DoneOk };
        info!(terminal = ?terminal, calls = calls.len(), "execution complete");
        Ok(ExecutionReport { terminal, calls, reason: None })
    }

    async fn inspect_position(&self, symbol: &str, master_addr: &str) -> Result<PositionSnapshot, EngineError> {
        let state = self
            .venue
            .clearinghouse_state(master_addr)
            .await
            .map_err(|e| EngineError::Connectivity(e.to_string()))?;
        Ok(state
            .positions
            .get(symbol)
            .copied()
            .unwrap_or(PositionSnapshot { size: Decimal::ZERO, entry_px: Decimal::ZERO }))
    }

    /// Flatten an opposing position before the entry is placed. Returns
    /// `Ok(Some(report))` if the whole dispatch must terminate `DONE_FAIL`
    /// here (fallback itself failed); `Ok(None)` to continue to ENTER.
    async fn flatten(
        &self,
        symbol: &str,
        entry_side: Side,
        position: PositionSnapshot,
        calls: &mut Vec<VenueCallRecord>,
    ) -> Result<Option<ExecutionReport>, EngineError> {
        let close = self.venue.market_close(symbol).await;

        let needs_fallback = match &close {
            Ok(Some(result)) => {
                calls.push(VenueCallRecord {
                    order_kind: "flatten_close".to_string(),
                    payload: payload_of(result),
                    status: status_of(result).to_string(),
                });
                result.is_rejected()
            }
            Ok(None) => {
                warn!(symbol, "market_close returned null, engaging fallback");
                calls.push(VenueCallRecord {
                    order_kind: "flatten_close".to_string(),
                    payload: serde_json::Value::Null,
                    status: "null".to_string(),
                });
                true
            }
            Err(e) => {
                calls.push(VenueCallRecord {
                    order_kind: "flatten_close".to_string(),
                    payload: serde_json::json!({ "error": e.to_string() }),
                    status: "rejected".to_string(),
                });
                true
            }
        };

        if !needs_fallback {
            return Ok(None);
        }

        // The legacy "limit IOC reduce_only" shape is forbidden here — it
        // historically surfaced as "order could not immediately match"
        // against empty book levels. Use immediate execution instead.
        let fallback_size = position.size.abs();
        let fallback = self
            .venue
            .market_open(symbol, entry_side, fallback_size, true)
            .await
            .map_err(|e| EngineError::Connectivity(e.to_string()))?;

        calls.push(VenueCallRecord {
            order_kind: "flatten_fallback".to_string(),
            payload: payload_of(&fallback),
            status: status_of(&fallback).to_string(),
        });

        if fallback.is_rejected() {
            return Ok(Some(ExecutionReport {
                terminal: Terminal::DoneFail,
                calls: calls.clone(),
                reason: Some("flatten fallback rejected, entry not attempted".to_string()),
            }));
        }

        Ok(None)
    }

    async fn enter(
        &self,
        symbol: &str,
        side: Side,
        entry: EntryType,
        size: Decimal,
        price: Option<Decimal>,
        meta: &SymbolMeta,
        calls: &mut Vec<VenueCallRecord>,
    ) -> Result<VenueResult, EngineError> {
        let result = match entry {
            EntryType::Market => self
                .venue
                .market_open(symbol, side, size, false)
                .await
                .map_err(|e| EngineError::Connectivity(e.to_string()))?,
            EntryType::Limit => {
                let px = format_price(meta, price.expect("validated above"));
                self.venue
                    .limit_order(symbol, side, size, px, TimeInForce::Gtc)
                    .await
                    .map_err(|e| EngineError::Connectivity(e.to_string()))?
            }
        };

        calls.push(VenueCallRecord {
            order_kind: "entry".to_string(),
            payload: payload_of(&result),
            status: status_of(&result).to_string(),
        });

        Ok(result)
    }

    async fn place_trigger(
        &self,
        symbol: &str,
        trigger_side: Side,
        size: Decimal,
        trigger_px: Decimal,
        is_market: bool,
        order_kind: &str,
        calls: &mut Vec<VenueCallRecord>,
    ) -> Result<VenueResult, EngineError> {
        let result = self
            .venue
            .trigger_order(symbol, trigger_side, size, trigger_px, is_market)
            .await
            .map_err(|e| EngineError::Connectivity(e.to_string()))?;

        calls.push(VenueCallRecord {
            order_kind: order_kind.to_string(),
            payload: payload_of(&result),
            status: status_of(&result).to_string(),
        });

        Ok(result)
    }

    /// Allocate entry-size shares across up to four TP levels. An explicit
    /// `perc` size is honored only if it individually fits within the entry
    /// size being split; an oversized explicit ask falls into the same
    /// equal-share pool as levels that only specify a price, rather than
    /// starving them to zero. If the total still exceeds the entry size,
    /// the excess is trimmed off the highest-numbered level first.
    fn allocate_tp_sizes(
        tps: &[crate::types::TakeProfitLevel; 4],
        entry_size: Decimal,
        meta: &SymbolMeta,
    ) -> [Decimal; 4] {
        let mut sizes = [Decimal::ZERO; 4];
        let mut explicit_total = Decimal::ZERO;
        let mut unsized_count = 0u32;

        for (idx, tp) in tps.iter().enumerate() {
            if tp.price.is_none() {
                continue;
            }
            match tp.perc {
                Some(p) if p <= entry_size => {
                    sizes[idx] = p;
                    explicit_total += p;
                }
                _ => unsized_count += 1,
            }
        }

        if unsized_count > 0 {
            let remaining = (entry_size - explicit_total).max(Decimal::ZERO);
            let share = remaining / Decimal::from(unsized_count);
            for (idx, tp) in tps.iter().enumerate() {
                if tp.price.is_none() {
                    continue;
                }
                let is_unsized = match tp.perc {
                    Some(p) => p > entry_size,
                    None => true,
                };
                if is_unsized {
                    sizes[idx] = share;
                }
            }
        }

        let mut total: Decimal = sizes.iter().sum();
        for idx in (0..4).rev() {
            if total <= entry_size {
                break;
            }
            let excess = total - entry_size;
            let trim = excess.min(sizes[idx]);
            sizes[idx] -= trim;
            total -= trim;
        }

        for size in sizes.iter_mut() {
            *size = truncate_size(meta, *size);
        }

        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TakeProfitLevel;
    use crate::venue::fake::FakeVenue;
    use rust_decimal_macros::dec;

    fn sol_meta() -> HashMap<String, SymbolMeta> {
        let mut m = HashMap::new();
        m.insert("SOL".to_string(), SymbolMeta { sz_decimals: 2, tick_size: dec!(0.1) });
        m
    }

    fn market_signal(side: Side, quantity: Decimal) -> Signal {
        Signal {
            symbol: "SOL".to_string(),
            side,
            entry: EntryType::Market,
            quantity,
            price: None,
            stop: None,
            tps: Default::default(),
            strategy_id: None,
        }
    }

    #[tokio::test]
    async fn scenario_1_market_entry_no_position() {
        let venue = Arc::new(FakeVenue::new(sol_meta()));
        let engine = ExecutionEngine::new(venue.clone());
        let signal = market_signal(Side::Buy, dec!(0.2));

        let report = engine.execute(&signal, "master").await.unwrap();

        assert_eq!(report.terminal, Terminal::DoneOk);
        assert_eq!(report.calls.len(), 1);
        assert_eq!(report.calls[0].order_kind, "entry");
    }

    #[tokio::test]
    async fn scenario_2_opposing_reversal_native_close() {
        let venue = Arc::new(FakeVenue::new(sol_meta()));
        venue.set_position("SOL", dec!(-10.73), dec!(100));
        let engine = ExecutionEngine::new(venue.clone());
        let signal = market_signal(Side::Buy, dec!(5));

        let report = engine.execute(&signal, "master").await.unwrap();

        assert_eq!(report.terminal, Terminal::DoneOk);
        assert_eq!(report.calls.len(), 2);
        assert_eq!(report.calls[0].order_kind, "flatten_close");
        assert_eq!(report.calls[1].order_kind, "entry");
    }

    #[tokio::test]
    async fn scenario_3_opposing_reversal_null_close_triggers_fallback() {
        let venue = Arc::new(FakeVenue::new(sol_meta()));
        venue.set_position("SOL", dec!(-10.73), dec!(100));
        venue.script_market_close(None);
        let engine = ExecutionEngine::new(venue.clone());
        let signal = market_signal(Side::Buy, dec!(5));

        let report = engine.execute(&signal, "master").await.unwrap();

        assert_eq!(report.terminal, Terminal::DoneOk);
        assert_eq!(report.calls.len(), 3);
        assert_eq!(report.calls[0].order_kind, "flatten_close");
        assert_eq!(report.calls[0].status, "null");
        assert_eq!(report.calls[1].order_kind, "flatten_fallback");
        assert_eq!(report.calls[2].order_kind, "entry");
    }

    #[tokio::test]
    async fn scenario_4_full_stack_clamps_tp2_to_remaining_size() {
        let venue = Arc::new(FakeVenue::new(sol_meta()));
        let engine = ExecutionEngine::new(venue.clone());
        let mut signal = market_signal(Side::Buy, dec!(0.2));
        signal.stop = Some(dec!(170.0));
        signal.tps[0] = TakeProfitLevel { price: Some(dec!(180.0)), perc: None };
        signal.tps[1] = TakeProfitLevel { price: Some(dec!(190.0)), perc: Some(dec!(10)) };

        let report = engine.execute(&signal, "master").await.unwrap();

        let kinds: Vec<&str> = report.calls.iter().map(|c| c.order_kind.as_str()).collect();
        assert_eq!(kinds, vec!["entry", "stop", "tp1", "tp2"]);
    }

    #[tokio::test]
    async fn invalid_symbol_is_rejected_before_any_venue_call() {
        let venue = Arc::new(FakeVenue::new(HashMap::new()));
        let engine = ExecutionEngine::new(venue.clone());
        let signal = market_signal(Side::Buy, dec!(1));

        let err = engine.execute(&signal, "master").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSignal(_)));
        assert!(venue.calls().is_empty());
    }

    #[tokio::test]
    async fn zero_size_after_truncation_is_invalid() {
        let venue = Arc::new(FakeVenue::new(sol_meta()));
        let engine = ExecutionEngine::new(venue.clone());
        let signal = market_signal(Side::Buy, dec!(0.001));

        let err = engine.execute(&signal, "master").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSignal(_)));
    }
}
