// =============================================================================
// Symbol Lock Manager (C7) — per-symbol mutual exclusion for order flow
// =============================================================================
//
// Reversals are non-atomic multi-step sequences (close -> open -> attach
// stop/TPs); interleaving two sequences on the same symbol can produce
// double exposure or orphan triggers. This guarantees at most one in-flight
// sequence per symbol at a time.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::EngineError;

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SymbolLockManager {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
    acquire_timeout: Duration,
}

/// Held for the duration of one signal's dispatch; the symbol's lock is
/// released when this is dropped.
pub struct SymbolGuard {
    _guard: OwnedMutexGuard<()>,
}

impl SymbolLockManager {
    pub fn new() -> Self {
        Self { locks: RwLock::new(HashMap::new()), acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT }
    }

    #[cfg(test)]
    pub fn with_timeout(acquire_timeout: Duration) -> Self {
        Self { locks: RwLock::new(HashMap::new()), acquire_timeout }
    }

    fn mutex_for(&self, symbol: &str) -> Arc<Mutex<()>> {
        if let Some(existing) = self.locks.read().get(symbol) {
            return existing.clone();
        }
        self.locks
            .write()
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the per-symbol lock, bounded by the configured ceiling.
    /// Times out as `SymbolBusy` rather than blocking indefinitely.
    pub async fn acquire(&self, symbol: &str) -> Result<SymbolGuard, EngineError> {
        let mutex = self.mutex_for(symbol);
        match tokio::time::timeout(self.acquire_timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(SymbolGuard { _guard: guard }),
            Err(_) => Err(EngineError::SymbolBusy(symbol.to_string())),
        }
    }
}

impl Default for SymbolLockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_acquisitions_on_same_symbol_do_not_overlap() {
        let manager = Arc::new(SymbolLockManager::new());
        let first = manager.acquire("SOL").await.unwrap();
        drop(first);
        let second = manager.acquire("SOL").await.unwrap();
        drop(second);
    }

    #[tokio::test]
    async fn different_symbols_acquire_independently() {
        let manager = SymbolLockManager::new();
        let a = manager.acquire("SOL").await.unwrap();
        let b = manager.acquire("BTC").await.unwrap();
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn held_lock_times_out_as_symbol_busy() {
        let manager = Arc::new(SymbolLockManager::with_timeout(Duration::from_millis(50)));
        let held = manager.acquire("SOL").await.unwrap();

        let err = manager.acquire("SOL").await.unwrap_err();
        assert!(matches!(err, EngineError::SymbolBusy(ref s) if s == "SOL"));

        drop(held);
    }
}
