//! Context persistence layer
//!
//! Loads and saves one serialized context document per conversation.
//! In-memory for development and tests; Postgres when a database URL is set.

pub mod postgres;

use crate::audit::{compute_document_hash, verify_document};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

pub use postgres::PostgresContextStore;

/// Trait for context document persistence
///
/// Documents are opaque JSON text; decoding them is the manager's job.
#[async_trait::async_trait]
pub trait ContextStore: Send + Sync {
    /// The last saved document, or `None` if the conversation has none
    async fn load(&self, conversation_id: Uuid) -> Result<Option<String>>;
    async fn save(&self, conversation_id: Uuid, document: &str) -> Result<()>;
}

/// A stored document with its integrity digest
#[derive(Debug, Clone)]
pub struct ContextRecord {
    pub document: String,
    pub state_hash: String,
    pub updated_at: DateTime<Utc>,
}

impl ContextRecord {
    pub fn new(document: impl Into<String>) -> Self {
        let document = document.into();
        Self {
            state_hash: compute_document_hash(&document),
            document,
            updated_at: Utc::now(),
        }
    }

    /// The document, unless it no longer matches its digest
    pub fn verified_document(self, conversation_id: Uuid) -> Option<String> {
        if verify_document(&self.document, &self.state_hash) {
            Some(self.document)
        } else {
            warn!(
                conversation_id = %conversation_id,
                "Stored context failed integrity check, treating as absent"
            );
            None
        }
    }
}

/// In-memory context store for development
pub struct InMemoryContextStore {
    records: Arc<RwLock<HashMap<Uuid, ContextRecord>>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a record as-is, bypassing digest computation
    pub async fn insert_record(&self, conversation_id: Uuid, record: ContextRecord) {
        let mut records = self.records.write().await;
        records.insert(conversation_id, record);
    }

    pub async fn conversation_count(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ContextStore for InMemoryContextStore {
    async fn load(&self, conversation_id: Uuid) -> Result<Option<String>> {
        let record = {
            let records = self.records.read().await;
            records.get(&conversation_id).cloned()
        };

        Ok(record.and_then(|r| r.verified_document(conversation_id)))
    }

    async fn save(&self, conversation_id: Uuid, document: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(conversation_id, ContextRecord::new(document));
        Ok(())
    }
}

/// Pick a store: Postgres when a database URL is configured, else in-memory
pub fn build_store(database_url: Option<&str>) -> Arc<dyn ContextStore> {
    if let Some(url) = database_url {
        match PostgresContextStore::connect_lazy(url) {
            Ok(store) => {
                info!("Conversation context backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres context backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Conversation context backend: in-memory");
    Arc::new(InMemoryContextStore::new())
}
