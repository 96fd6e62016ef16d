// =============================================================================
// MemoryStore — in-process Store implementation for tests and MONGO_URL-less
// development runs
// =============================================================================

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::EngineError;
use crate::journal::{JournalEntry, JournalKind, LogLevel};
use crate::strategy_registry::Strategy;

use super::Store;

#[derive(Default)]
pub struct MemoryStore {
    logs: RwLock<Vec<JournalEntry>>,
    webhooks: RwLock<Vec<JournalEntry>>,
    responses: RwLock<Vec<JournalEntry>>,
    strategies: RwLock<HashMap<String, Strategy>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn take_recent(entries: &[JournalEntry], limit: usize) -> Vec<JournalEntry> {
    entries.iter().rev().take(limit).cloned().collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn append_log(&self, entry: JournalEntry) -> Result<(), EngineError> {
        self.logs.write().push(entry);
        Ok(())
    }

    async fn append_webhook(&self, entry: JournalEntry) -> Result<(), EngineError> {
        self.webhooks.write().push(entry);
        Ok(())
    }

    async fn append_response(&self, entry: JournalEntry) -> Result<(), EngineError> {
        self.responses.write().push(entry);
        Ok(())
    }

    async fn query_logs(&self, limit: usize, level_filter: Option<LogLevel>) -> Result<Vec<JournalEntry>, EngineError> {
        let logs = self.logs.read();
        let filtered: Vec<JournalEntry> = logs
            .iter()
            .filter(|e| match (&e.kind, level_filter) {
                (JournalKind::Log { level, .. }, Some(wanted)) => *level == wanted,
                (JournalKind::Log { .. }, None) => true,
                _ => false,
            })
            .cloned()
            .collect();
        Ok(take_recent(&filtered, limit))
    }

    async fn query_webhooks(&self, limit: usize, strategy_ids: Option<Vec<String>>) -> Result<Vec<JournalEntry>, EngineError> {
        let webhooks = self.webhooks.read();
        let filtered: Vec<JournalEntry> = webhooks
            .iter()
            .filter(|e| match &strategy_ids {
                Some(ids) => e.strategy_id().map(|s| ids.iter().any(|i| i == s)).unwrap_or(false),
                None => true,
            })
            .cloned()
            .collect();
        Ok(take_recent(&filtered, limit))
    }

    async fn query_responses(&self, limit: usize, strategy_ids: Option<Vec<String>>) -> Result<Vec<JournalEntry>, EngineError> {
        let responses = self.responses.read();
        let filtered: Vec<JournalEntry> = responses
            .iter()
            .filter(|e| match &strategy_ids {
                Some(ids) => e.strategy_id().map(|s| ids.iter().any(|i| i == s)).unwrap_or(false),
                None => true,
            })
            .cloned()
            .collect();
        Ok(take_recent(&filtered, limit))
    }

    async fn clear_logs(&self) -> Result<u64, EngineError> {
        let mut logs = self.logs.write();
        let count = logs.len() as u64;
        logs.clear();
        Ok(count)
    }

    async fn load_strategies(&self) -> Result<Vec<Strategy>, EngineError> {
        Ok(self.strategies.read().values().cloned().collect())
    }

    async fn save_strategy(&self, strategy: &Strategy) -> Result<(), EngineError> {
        self.strategies.write().insert(strategy.id.clone(), strategy.clone());
        Ok(())
    }
}
