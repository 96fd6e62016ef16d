// =============================================================================
// Event Journal (C5) — append-only, timezone-aware audit trail
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::Store;

/// America/Sao_Paulo never observes DST under current law; the offset is
/// attached unconditionally at append time and never recomputed.
fn journal_offset() -> FixedOffset {
    FixedOffset::east_opt(-3 * 3600).expect("fixed offset -03:00 is always valid")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// The three closed variants of a journal entry. Adding a fourth is a
/// breaking change to every store implementation and every query filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum JournalKind {
    Log {
        level: LogLevel,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },
    WebhookReceived {
        payload: serde_json::Value,
        status: String,
        strategy_id: String,
    },
    VenueResponse {
        payload: serde_json::Value,
        status: String,
        strategy_id: String,
        order_kind: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_id: Option<Uuid>,
    #[serde(flatten)]
    pub kind: JournalKind,
}

impl JournalEntry {
    pub fn strategy_id(&self) -> Option<&str> {
        match &self.kind {
            JournalKind::WebhookReceived { strategy_id, .. } => Some(strategy_id),
            JournalKind::VenueResponse { strategy_id, .. } => Some(strategy_id),
            JournalKind::Log { .. } => None,
        }
    }
}

pub struct Journal {
    store: Arc<dyn Store>,
    seq: AtomicU64,
}

impl Journal {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, seq: AtomicU64::new(1) }
    }

    fn next_entry(&self, dispatch_id: Option<Uuid>, kind: JournalKind) -> JournalEntry {
        JournalEntry {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            timestamp: chrono::Utc::now().with_timezone(&journal_offset()),
            dispatch_id,
            kind,
        }
    }

    pub async fn log(&self, level: LogLevel, message: impl Into<String>) -> Result<(), EngineError> {
        let entry = self.next_entry(None, JournalKind::Log { level, message: message.into(), details: None });
        self.store.append_log(entry).await
    }

    pub async fn log_with_details(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Result<(), EngineError> {
        let entry = self.next_entry(
            None,
            JournalKind::Log { level, message: message.into(), details: Some(details) },
        );
        self.store.append_log(entry).await
    }

    pub async fn webhook_received(
        &self,
        dispatch_id: Uuid,
        payload: serde_json::Value,
        status: impl Into<String>,
        strategy_id: impl Into<String>,
    ) -> Result<(), EngineError> {
        let entry = self.next_entry(
            Some(dispatch_id),
            JournalKind::WebhookReceived { payload, status: status.into(), strategy_id: strategy_id.into() },
        );
        self.store.append_webhook(entry).await
    }

    pub async fn venue_response(
        &self,
        dispatch_id: Uuid,
        payload: serde_json::Value,
        status: impl Into<String>,
        strategy_id: impl Into<String>,
        order_kind: impl Into<String>,
    ) -> Result<(), EngineError> {
        let entry = self.next_entry(
            Some(dispatch_id),
            JournalKind::VenueResponse {
                payload,
                status: status.into(),
                strategy_id: strategy_id.into(),
                order_kind: order_kind.into(),
            },
        );
        self.store.append_response(entry).await
    }

    pub async fn recent_logs(&self, limit: usize, level_filter: Option<LogLevel>) -> Result<Vec<JournalEntry>, EngineError> {
        self.store.query_logs(limit, level_filter).await
    }

    /// `strategy_ids = Some(empty)` is an explicit user gesture and returns
    /// no entries; `strategy_ids = None` means the filter was omitted.
    pub async fn recent_webhooks(
        &self,
        limit: usize,
        strategy_ids: Option<Vec<String>>,
    ) -> Result<Vec<JournalEntry>, EngineError> {
        if let Some(ref ids) = strategy_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }
        self.store.query_webhooks(limit, strategy_ids).await
    }

    pub async fn recent_responses(
        &self,
        limit: usize,
        strategy_ids: Option<Vec<String>>,
    ) -> Result<Vec<JournalEntry>, EngineError> {
        if let Some(ref ids) = strategy_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }
        self.store.query_responses(limit, strategy_ids).await
    }

    pub async fn clear_logs(&self) -> Result<u64, EngineError> {
        self.store.clear_logs().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn webhook_precedes_its_venue_responses() {
        let store = Arc::new(MemoryStore::new());
        let journal = Journal::new(store);
        let dispatch_id = Uuid::new_v4();

        journal
            .webhook_received(dispatch_id, serde_json::json!({"symbol": "SOL"}), "accepted", "OTHERS")
            .await
            .unwrap();
        journal
            .venue_response(dispatch_id, serde_json::json!({"ok": true}), "filled", "OTHERS", "market_open")
            .await
            .unwrap();

        let webhooks = journal.recent_webhooks(10, None).await.unwrap();
        let responses = journal.recent_responses(10, None).await.unwrap();

        assert_eq!(webhooks.len(), 1);
        assert_eq!(responses.len(), 1);
        assert!(webhooks[0].seq < responses[0].seq);
    }

    #[tokio::test]
    async fn empty_strategy_filter_yields_empty_set() {
        let store = Arc::new(MemoryStore::new());
        let journal = Journal::new(store);
        journal
            .webhook_received(Uuid::new_v4(), serde_json::json!({}), "accepted", "OTHERS")
            .await
            .unwrap();

        let filtered = journal.recent_webhooks(10, Some(Vec::new())).await.unwrap();
        assert!(filtered.is_empty());

        let unfiltered = journal.recent_webhooks(10, None).await.unwrap();
        assert_eq!(unfiltered.len(), 1);
    }
}
