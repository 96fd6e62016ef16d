// =============================================================================
// Store port (C5a) — persistence backend for the Journal and Strategy Registry
// =============================================================================

pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::journal::{JournalEntry, LogLevel};
use crate::strategy_registry::Strategy;

#[async_trait]
pub trait Store: Send + Sync {
    async fn append_log(&self, entry: JournalEntry) -> Result<(), EngineError>;
    async fn append_webhook(&self, entry: JournalEntry) -> Result<(), EngineError>;
    async fn append_response(&self, entry: JournalEntry) -> Result<(), EngineError>;

    async fn query_logs(&self, limit: usize, level_filter: Option<LogLevel>) -> Result<Vec<JournalEntry>, EngineError>;
    async fn query_webhooks(&self, limit: usize, strategy_ids: Option<Vec<String>>) -> Result<Vec<JournalEntry>, EngineError>;
    async fn query_responses(&self, limit: usize, strategy_ids: Option<Vec<String>>) -> Result<Vec<JournalEntry>, EngineError>;

    async fn clear_logs(&self) -> Result<u64, EngineError>;

    async fn load_strategies(&self) -> Result<Vec<Strategy>, EngineError>;
    async fn save_strategy(&self, strategy: &Strategy) -> Result<(), EngineError>;
}
