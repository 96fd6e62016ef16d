// =============================================================================
// Balance Cache (C4) — TTL-bounded snapshot of spot+perp equity
// =============================================================================
//
// Holds `tokio::sync::Mutex` across the refresh `.await` on purpose: that is
// what gives concurrent misses single-flight collapse for free, at the cost
// of diverging from the rest of the codebase's `parking_lot` convention
// (parking_lot guards cannot be held across an await point).
// =============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::debug;

use crate::account::AccountResolver;
use crate::error::EngineError;
use crate::venue::VenuePort;

const TTL: Duration = Duration::from_secs(30);

struct CacheSlot {
    equity: Option<Decimal>,
    fetched_at: Option<Instant>,
}

pub struct BalanceCache {
    venue: Arc<dyn VenuePort>,
    account: Arc<AccountResolver>,
    slot: Mutex<CacheSlot>,
}

impl BalanceCache {
    pub fn new(venue: Arc<dyn VenuePort>, account: Arc<AccountResolver>) -> Self {
        Self {
            venue,
            account,
            slot: Mutex::new(CacheSlot { equity: None, fetched_at: None }),
        }
    }

    /// Return the current combined spot+perp equity, refreshing if the cache
    /// is empty or past its TTL. Concurrent callers collapse onto one fetch.
    pub async fn get(&self) -> Result<Decimal, EngineError> {
        let mut slot = self.slot.lock().await;

        if let (Some(equity), Some(fetched_at)) = (slot.equity, slot.fetched_at) {
            if fetched_at.elapsed() < TTL {
                return Ok(equity);
            }
        }

        let master = self.account.resolve().await?;

        let clearinghouse = self
            .venue
            .clearinghouse_state(&master)
            .await
            .map_err(|e| EngineError::Connectivity(e.to_string()))?;

        let spot = self
            .venue
            .spot_state(&master)
            .await
            .map_err(|e| EngineError::Connectivity(e.to_string()))?;

        let spot_equity: Decimal = spot.iter().map(|b| b.free + b.locked).sum();
        let total = clearinghouse.perp_equity + spot_equity;

        debug!(%total, "balance cache refreshed");
        slot.equity = Some(total);
        slot.fetched_at = Some(Instant::now());

        Ok(total)
    }
}
