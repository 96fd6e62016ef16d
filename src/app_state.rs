// =============================================================================
// Central Application State — Signal Bridge
// =============================================================================
//
// Single source of truth shared across the HTTP handlers and the uptime
// prober task via `Arc<AppState>`. The venue-facing subsystems (venue
// client, account resolver, balance cache, execution engine) are grouped
// under `EnvState` because switching `ENVIRONMENT` at runtime rebuilds all
// four together; everything else survives an environment switch untouched.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;

use crate::account::AccountResolver;
use crate::balance_cache::BalanceCache;
use crate::config::Config;
use crate::error::EngineError;
use crate::execution::ExecutionEngine;
use crate::journal::Journal;
use crate::store::Store;
use crate::strategy_registry::StrategyRegistry;
use crate::symbol_lock::SymbolLockManager;
use crate::types::Environment;
use crate::uptime::UptimeStats;
use crate::venue::client::HttpVenueClient;
use crate::venue::VenuePort;

/// The subset of state that a `POST /environment` switch rebuilds wholesale.
pub struct EnvState {
    pub environment: Environment,
    pub venue: Arc<dyn VenuePort>,
    pub account: Arc<AccountResolver>,
    pub balance_cache: Arc<BalanceCache>,
    pub execution: Arc<ExecutionEngine>,
}

impl EnvState {
    fn build(environment: Environment, venue_key: crate::config::VenueKey, base_url: String) -> Self {
        let venue: Arc<dyn VenuePort> =
            Arc::new(HttpVenueClient::new(venue_key.address.clone(), venue_key.secret, base_url));
        let account = Arc::new(AccountResolver::new(venue.clone(), venue_key.address));
        let balance_cache = Arc::new(BalanceCache::new(venue.clone(), account.clone()));
        let execution = Arc::new(ExecutionEngine::new(venue.clone()));
        Self { environment, venue, account, balance_cache, execution }
    }
}

pub struct AppState {
    env_state: RwLock<EnvState>,
    pub store: Arc<dyn Store>,
    pub journal: Arc<Journal>,
    pub strategies: Arc<StrategyRegistry>,
    pub symbol_locks: Arc<SymbolLockManager>,
    pub uptime: Arc<UptimeStats>,
    pub start_time: Instant,
    pub admin_token: Option<String>,
}

impl AppState {
    pub async fn new(config: &Config, store: Arc<dyn Store>) -> Result<Self, EngineError> {
        let venue_key: crate::config::VenueKey = match config.environment {
            Environment::Testnet => std::env::var("HYPERLIQUID_TESTNET_KEY")
                .map_err(|_| EngineError::Configuration("missing HYPERLIQUID_TESTNET_KEY".to_string()))?
                .parse()?,
            Environment::Mainnet => std::env::var("HYPERLIQUID_MAINNET_KEY")
                .map_err(|_| EngineError::Configuration("missing HYPERLIQUID_MAINNET_KEY".to_string()))?
                .parse()?,
        };

        let env_state = EnvState::build(config.environment, venue_key, config.venue_base_url.clone());

        let journal = Arc::new(Journal::new(store.clone()));
        let strategies = Arc::new(StrategyRegistry::load(store.clone()).await?);

        Ok(Self {
            env_state: RwLock::new(env_state),
            store,
            journal,
            strategies,
            symbol_locks: Arc::new(SymbolLockManager::new()),
            uptime: UptimeStats::new(Utc::now()),
            start_time: Instant::now(),
            admin_token: config.admin_token.clone(),
        })
    }

    pub fn environment(&self) -> Environment {
        self.env_state.read().environment
    }

    pub fn venue(&self) -> Arc<dyn VenuePort> {
        self.env_state.read().venue.clone()
    }

    pub fn account(&self) -> Arc<AccountResolver> {
        self.env_state.read().account.clone()
    }

    pub fn balance_cache(&self) -> Arc<BalanceCache> {
        self.env_state.read().balance_cache.clone()
    }

    pub fn execution(&self) -> Arc<ExecutionEngine> {
        self.env_state.read().execution.clone()
    }

    /// Rebuild the venue-facing subsystems against the other network.
    pub fn switch_environment(&self, environment: Environment) -> Result<(), EngineError> {
        let (venue_key, base_url) = Config::for_environment(environment)?;
        let rebuilt = EnvState::build(environment, venue_key, base_url);
        *self.env_state.write() = rebuilt;
        Ok(())
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    #[cfg(test)]
    #[allow(clippy::too_many_arguments)]
    pub fn new_for_test(
        store: Arc<dyn Store>,
        journal: Arc<Journal>,
        strategies: Arc<StrategyRegistry>,
        venue: Arc<dyn VenuePort>,
        account: Arc<AccountResolver>,
        balance_cache: Arc<BalanceCache>,
        execution: Arc<ExecutionEngine>,
    ) -> Self {
        Self {
            env_state: RwLock::new(EnvState {
                environment: Environment::Testnet,
                venue,
                account,
                balance_cache,
                execution,
            }),
            store,
            journal,
            strategies,
            symbol_locks: Arc::new(SymbolLockManager::new()),
            uptime: UptimeStats::new(Utc::now()),
            start_time: Instant::now(),
            admin_token: Some("test-admin-token".to_string()),
        }
    }
}
