// =============================================================================
// Strategy Registry (C6) — named rule-sets, auto-discovery, counters
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::EngineError;
use crate::store::Store;

pub const IMBA_HYPER: &str = "IMBA_HYPER";
pub const OTHERS: &str = "OTHERS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRules {
    pub max_position_size: Decimal,
    pub max_daily_trades: u32,
    pub max_drawdown: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct StrategyStats {
    #[serde(default)]
    pub total_webhooks: u64,
    #[serde(default)]
    pub successful_forwards: u64,
    #[serde(default)]
    pub failed_forwards: u64,
}

/// Outcome of dispatching a signal, used to bump the right counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub enabled: bool,
    pub rules: StrategyRules,
    pub stats: StrategyStats,
}

impl Strategy {
    fn seed(id: &str, max_position_size: Decimal, max_daily_trades: u32, max_drawdown: Decimal) -> Self {
        Self {
            id: id.to_string(),
            enabled: true,
            rules: StrategyRules { max_position_size, max_daily_trades, max_drawdown },
            stats: StrategyStats::default(),
        }
    }

    fn seed_imba_hyper() -> Self {
        Self::seed(IMBA_HYPER, dec!(100.0), 50, dec!(0.05))
    }

    fn seed_others() -> Self {
        Self::seed(OTHERS, dec!(50.0), 25, dec!(0.03))
    }
}

pub struct StrategyRegistry {
    store: Arc<dyn Store>,
    strategies: RwLock<HashMap<String, Strategy>>,
}

impl StrategyRegistry {
    /// Load persisted strategies from the store, seeding `IMBA_HYPER` and
    /// `OTHERS` if either is missing.
    pub async fn load(store: Arc<dyn Store>) -> Result<Self, EngineError> {
        let mut map: HashMap<String, Strategy> = store
            .load_strategies()
            .await?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        let mut to_seed = Vec::new();
        if !map.contains_key(IMBA_HYPER) {
            to_seed.push(Strategy::seed_imba_hyper());
        }
        if !map.contains_key(OTHERS) {
            to_seed.push(Strategy::seed_others());
        }

        for strategy in to_seed {
            store.save_strategy(&strategy).await?;
            map.insert(strategy.id.clone(), strategy);
        }

        Ok(Self { store, strategies: RwLock::new(map) })
    }

    pub fn get(&self, id: &str) -> Option<Strategy> {
        self.strategies.read().get(id).cloned()
    }

    pub fn list(&self) -> HashMap<String, Strategy> {
        self.strategies.read().clone()
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.strategies.read().keys().cloned().collect()
    }

    /// Resolve a signal's strategy id, auto-registering an unknown one with
    /// `OTHERS` defaults. Idempotent: calling twice with the same fresh id
    /// registers exactly one new entry.
    pub async fn ensure(&self, id: Option<&str>) -> Result<Strategy, EngineError> {
        let id = id.unwrap_or(OTHERS).to_string();

        if let Some(existing) = self.strategies.read().get(&id).cloned() {
            return Ok(existing);
        }

        let mut fresh = Strategy::seed_others();
        fresh.id = id.clone();
        self.store.save_strategy(&fresh).await?;
        self.strategies.write().insert(id.clone(), fresh.clone());
        info!(strategy_id = %id, "strategy auto-registered");
        Ok(fresh)
    }

    pub async fn toggle(&self, id: &str) -> Result<Strategy, EngineError> {
        let mut guard = self.strategies.write();
        let strategy = guard
            .get_mut(id)
            .ok_or_else(|| EngineError::InvalidSignal(format!("unknown strategy id '{id}'")))?;
        strategy.enabled = !strategy.enabled;
        let updated = strategy.clone();
        drop(guard);
        self.store.save_strategy(&updated).await?;
        Ok(updated)
    }

    /// Bump the strategy's counters under the caller's symbol lock. Never
    /// called concurrently for the same strategy from two signals on the
    /// same symbol, but different symbols may race — the write lock covers
    /// the whole map so this stays correct regardless.
    pub async fn increment(&self, id: &str, outcome: Outcome) -> Result<(), EngineError> {
        let updated = {
            let mut guard = self.strategies.write();
            let strategy = match guard.get_mut(id) {
                Some(s) => s,
                None => return Ok(()),
            };
            strategy.stats.total_webhooks += 1;
            match outcome {
                Outcome::Success => strategy.stats.successful_forwards += 1,
                Outcome::Failure => strategy.stats.failed_forwards += 1,
            }
            strategy.clone()
        };
        self.store.save_strategy(&updated).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn seeds_imba_hyper_and_others_on_first_load() {
        let store = Arc::new(MemoryStore::new());
        let registry = StrategyRegistry::load(store).await.unwrap();
        assert!(registry.get(IMBA_HYPER).is_some());
        assert!(registry.get(OTHERS).is_some());
    }

    #[tokio::test]
    async fn ensure_is_idempotent_for_fresh_ids() {
        let store = Arc::new(MemoryStore::new());
        let registry = StrategyRegistry::load(store).await.unwrap();

        registry.ensure(Some("FRESH_ID")).await.unwrap();
        registry.ensure(Some("FRESH_ID")).await.unwrap();

        let ids = registry.list_ids();
        assert_eq!(ids.iter().filter(|id| id.as_str() == "FRESH_ID").count(), 1);
    }

    #[tokio::test]
    async fn missing_strategy_id_binds_to_others() {
        let store = Arc::new(MemoryStore::new());
        let registry = StrategyRegistry::load(store).await.unwrap();
        let strategy = registry.ensure(None).await.unwrap();
        assert_eq!(strategy.id, OTHERS);
    }

    #[tokio::test]
    async fn toggle_flips_enabled() {
        let store = Arc::new(MemoryStore::new());
        let registry = StrategyRegistry::load(store).await.unwrap();
        let before = registry.get(OTHERS).unwrap().enabled;
        let after = registry.toggle(OTHERS).await.unwrap();
        assert_eq!(after.enabled, !before);
    }
}
