// =============================================================================
// Ingress Facade (C10) — webhook validation, dispatch, and journaling
// =============================================================================
//
// The single entry point both `/webhook/tradingview` and
// `/webhook/re-execute` funnel through. Re-execution re-parses a previously
// journaled payload and re-enters here as if newly received: a fresh
// journal entry is produced, the original is never mutated.
// =============================================================================

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::EngineError;
use crate::execution::Terminal;
use crate::journal::LogLevel;
use crate::strategy_registry::Outcome;
use crate::types::{RawSignal, Signal};

#[derive(Debug, Clone, serde::Serialize)]
pub struct IngressResponse {
    pub dispatch_id: Uuid,
    pub terminal: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn terminal_label(terminal: Terminal) -> &'static str {
    match terminal {
        Terminal::DoneOk => "DONE_OK",
        Terminal::DonePartial => "DONE_PARTIAL",
        Terminal::DoneFail => "DONE_FAIL",
    }
}

/// Validate, journal, dispatch, and journal-again one signal payload.
pub async fn handle_signal(state: &Arc<AppState>, payload: Value) -> Result<IngressResponse, EngineError> {
    let dispatch_id = Uuid::new_v4();

    let raw: RawSignal = serde_json::from_value(payload.clone())
        .map_err(|e| EngineError::InvalidSignal(format!("malformed webhook payload: {e}")))?;
    let signal: Signal = raw.into();
    let strategy_id = signal.strategy_id_or_default();

    let strategy = state.strategies.ensure(Some(&strategy_id)).await?;

    if !strategy.enabled {
        state
            .journal
            .webhook_received(dispatch_id, payload, "strategy_disabled", &strategy_id)
            .await?;
        warn!(%dispatch_id, strategy_id = %strategy_id, "strategy disabled, short-circuiting before any venue call");
        return Err(EngineError::StrategyDisabled(strategy_id));
    }

    state
        .journal
        .webhook_received(dispatch_id, payload, "accepted", &strategy_id)
        .await?;

    let guard = state.symbol_locks.acquire(&signal.symbol).await?;

    let master_addr = state.account().resolve().await?;
    let dispatch = state.execution().execute(&signal, &master_addr).await;
    drop(guard);

    match dispatch {
        Ok(report) => {
            for call in &report.calls {
                state
                    .journal
                    .venue_response(
                        dispatch_id,
                        call.payload.clone(),
                        call.status.clone(),
                        &strategy_id,
                        call.order_kind.clone(),
                    )
                    .await?;
            }

            let outcome = if report.terminal.is_success() { Outcome::Success } else { Outcome::Failure };
            state.strategies.increment(&strategy_id, outcome).await?;

            info!(%dispatch_id, strategy_id = %strategy_id, terminal = terminal_label(report.terminal), "dispatch complete");

            Ok(IngressResponse {
                dispatch_id,
                terminal: terminal_label(report.terminal),
                reason: report.reason,
            })
        }
        Err(err) => {
            state.strategies.increment(&strategy_id, Outcome::Failure).await?;
            state
                .journal
                .log_with_details(
                    LogLevel::Error,
                    format!("dispatch {dispatch_id} failed before producing a report"),
                    serde_json::json!({ "error": err.to_string(), "kind": err.kind() }),
                )
                .await?;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::venue::fake::FakeVenue;
    use std::collections::HashMap;

    fn payload(strategy_id: Option<&str>) -> Value {
        let mut body = serde_json::json!({
            "symbol": "SOL",
            "side": "buy",
            "entry": "market",
            "quantity": "0.2",
        });
        if let Some(id) = strategy_id {
            body["strategy_id"] = serde_json::Value::String(id.to_string());
        }
        body
    }

    async fn test_state() -> Arc<AppState> {
        let store = Arc::new(MemoryStore::new());
        let mut meta = HashMap::new();
        meta.insert(
            "SOL".to_string(),
            crate::types::SymbolMeta { sz_decimals: 2, tick_size: rust_decimal_macros::dec!(0.1) },
        );
        let venue: Arc<dyn crate::venue::VenuePort> = Arc::new(FakeVenue::new(meta));
        let account = Arc::new(crate::account::AccountResolver::new(venue.clone(), "master".to_string()));
        let balance_cache = Arc::new(crate::balance_cache::BalanceCache::new(venue.clone(), account.clone()));
        let execution = Arc::new(crate::execution::ExecutionEngine::new(venue.clone()));
        let journal = Arc::new(crate::journal::Journal::new(store.clone()));
        let strategies = Arc::new(crate::strategy_registry::StrategyRegistry::load(store.clone()).await.unwrap());

        Arc::new(AppState::new_for_test(
            store,
            journal,
            strategies,
            venue,
            account,
            balance_cache,
            execution,
        ))
    }

    #[tokio::test]
    async fn well_formed_signal_dispatches_and_returns_dispatch_id() {
        let state = test_state().await;
        let response = handle_signal(&state, payload(None)).await.unwrap();
        assert_eq!(response.terminal, "DONE_OK");
    }

    #[tokio::test]
    async fn disabled_strategy_short_circuits_before_any_venue_call() {
        let state = test_state().await;
        state.strategies.ensure(Some("QUIET")).await.unwrap();
        state.strategies.toggle("QUIET").await.unwrap();

        let err = handle_signal(&state, payload(Some("QUIET"))).await.unwrap_err();
        assert!(matches!(err, EngineError::StrategyDisabled(_)));

        let webhooks = state.journal.recent_webhooks(10, None).await.unwrap();
        assert_eq!(webhooks.len(), 1);
        assert_eq!(webhooks[0].strategy_id(), Some("QUIET"));
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_before_journaling() {
        let state = test_state().await;
        let bad = serde_json::json!({ "symbol": "SOL" });
        let err = handle_signal(&state, bad).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSignal(_)));

        let webhooks = state.journal.recent_webhooks(10, None).await.unwrap();
        assert!(webhooks.is_empty());
    }
}
