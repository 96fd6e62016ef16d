// =============================================================================
// MongoStore — `mongodb` 3.x backed Store implementation
// =============================================================================
//
// Three collections hold the JournalEntry variants (`logs`, `webhooks`,
// `responses`); a fourth (`strategies`) persists the Strategy Registry
// keyed by `id`.
// =============================================================================

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, to_bson};
use mongodb::options::FindOptions;
use mongodb::{Client, Collection, Database};
use tracing::instrument;

use crate::error::EngineError;
use crate::journal::{JournalEntry, LogLevel};
use crate::strategy_registry::Strategy;

use super::Store;

pub struct MongoStore {
    logs: Collection<JournalEntry>,
    webhooks: Collection<JournalEntry>,
    responses: Collection<JournalEntry>,
    strategies: Collection<Strategy>,
}

impl MongoStore {
    pub async fn connect(mongo_url: &str, db_name: &str) -> Result<Self, EngineError> {
        let client = Client::with_uri_str(mongo_url)
            .await
            .map_err(|e| EngineError::Configuration(format!("failed to connect to MongoDB: {e}")))?;
        let db: Database = client.database(db_name);

        Ok(Self {
            logs: db.collection("logs"),
            webhooks: db.collection("webhooks"),
            responses: db.collection("responses"),
            strategies: db.collection("strategies"),
        })
    }

    fn mongo_err(e: mongodb::error::Error) -> EngineError {
        EngineError::Connectivity(format!("mongodb: {e}"))
    }

    async fn insert(collection: &Collection<JournalEntry>, entry: JournalEntry) -> Result<(), EngineError> {
        collection.insert_one(entry).await.map_err(Self::mongo_err)?;
        Ok(())
    }

    async fn recent(
        collection: &Collection<JournalEntry>,
        filter: mongodb::bson::Document,
        limit: usize,
    ) -> Result<Vec<JournalEntry>, EngineError> {
        let options = FindOptions::builder()
            .sort(doc! { "seq": -1 })
            .limit(limit as i64)
            .build();
        let mut cursor = collection.find(filter).with_options(options).await.map_err(Self::mongo_err)?;

        let mut out = Vec::new();
        while let Some(entry) = cursor.try_next().await.map_err(Self::mongo_err)? {
            out.push(entry);
        }
        Ok(out)
    }
}

#[async_trait]
impl Store for MongoStore {
    #[instrument(skip(self, entry), name = "mongo::append_log")]
    async fn append_log(&self, entry: JournalEntry) -> Result<(), EngineError> {
        Self::insert(&self.logs, entry).await
    }

    #[instrument(skip(self, entry), name = "mongo::append_webhook")]
    async fn append_webhook(&self, entry: JournalEntry) -> Result<(), EngineError> {
        Self::insert(&self.webhooks, entry).await
    }

    #[instrument(skip(self, entry), name = "mongo::append_response")]
    async fn append_response(&self, entry: JournalEntry) -> Result<(), EngineError> {
        Self::insert(&self.responses, entry).await
    }

    async fn query_logs(&self, limit: usize, level_filter: Option<LogLevel>) -> Result<Vec<JournalEntry>, EngineError> {
        let filter = match level_filter {
            Some(level) => {
                let level_bson = to_bson(&level).map_err(|e| EngineError::Configuration(e.to_string()))?;
                doc! { "level": level_bson }
            }
            None => doc! {},
        };
        Self::recent(&self.logs, filter, limit).await
    }

    async fn query_webhooks(&self, limit: usize, strategy_ids: Option<Vec<String>>) -> Result<Vec<JournalEntry>, EngineError> {
        let filter = match strategy_ids {
            Some(ids) => doc! { "strategy_id": { "$in": ids } },
            None => doc! {},
        };
        Self::recent(&self.webhooks, filter, limit).await
    }

    async fn query_responses(&self, limit: usize, strategy_ids: Option<Vec<String>>) -> Result<Vec<JournalEntry>, EngineError> {
        let filter = match strategy_ids {
            Some(ids) => doc! { "strategy_id": { "$in": ids } },
            None => doc! {},
        };
        Self::recent(&self.responses, filter, limit).await
    }

    async fn clear_logs(&self) -> Result<u64, EngineError> {
        let result = self.logs.delete_many(doc! {}).await.map_err(Self::mongo_err)?;
        Ok(result.deleted_count)
    }

    async fn load_strategies(&self) -> Result<Vec<Strategy>, EngineError> {
        let mut cursor = self.strategies.find(doc! {}).await.map_err(Self::mongo_err)?;
        let mut out = Vec::new();
        while let Some(strategy) = cursor.try_next().await.map_err(Self::mongo_err)? {
            out.push(strategy);
        }
        Ok(out)
    }

    async fn save_strategy(&self, strategy: &Strategy) -> Result<(), EngineError> {
        self.strategies
            .replace_one(doc! { "id": &strategy.id }, strategy)
            .upsert(true)
            .await
            .map_err(Self::mongo_err)?;
        Ok(())
    }
}
