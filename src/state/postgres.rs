//! Postgres-backed context store
//!
//! One row per conversation holding the serialized context document.

use crate::error::ContextError;
use crate::state::{ContextRecord, ContextStore};
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

pub struct PostgresContextStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresContextStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Create a store whose pool connects on first use
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| {
                ContextError::DatabaseError(format!("Invalid context database URL: {}", e))
            })?;

        Ok(Self::new(pool))
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS conversation_context (
                      conversation_id UUID PRIMARY KEY,
                      document TEXT NOT NULL,
                      state_hash TEXT NOT NULL,
                      current_turn INTEGER,
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                ContextError::DatabaseError(format!(
                    "Failed to initialize conversation context schema: {}",
                    e
                ))
            })?;

        Ok(())
    }
}

/// Turn counter of a document, kept in its own column for inspection
fn document_turn(document: &str) -> Option<i32> {
    serde_json::from_str::<serde_json::Value>(document)
        .ok()?
        .get("currentTurn")?
        .as_i64()
        .and_then(|turn| i32::try_from(turn).ok())
}

#[async_trait::async_trait]
impl ContextStore for PostgresContextStore {
    async fn load(&self, conversation_id: Uuid) -> Result<Option<String>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT document, state_hash, updated_at
            FROM conversation_context
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            ContextError::DatabaseError(format!("Failed to load conversation context: {}", e))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let record = ContextRecord {
            document: row.try_get("document").unwrap_or_default(),
            state_hash: row.try_get("state_hash").unwrap_or_default(),
            updated_at: row
                .try_get::<DateTime<Utc>, _>("updated_at")
                .unwrap_or_else(|_| Utc::now()),
        };

        Ok(record.verified_document(conversation_id))
    }

    async fn save(&self, conversation_id: Uuid, document: &str) -> Result<()> {
        self.ensure_schema().await?;

        let record = ContextRecord::new(document);

        sqlx::query(
            r#"
            INSERT INTO conversation_context
              (conversation_id, document, state_hash, current_turn, updated_at)
            VALUES
              ($1, $2, $3, $4, $5)
            ON CONFLICT (conversation_id) DO UPDATE SET
              document = EXCLUDED.document,
              state_hash = EXCLUDED.state_hash,
              current_turn = EXCLUDED.current_turn,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(conversation_id)
        .bind(&record.document)
        .bind(&record.state_hash)
        .bind(document_turn(document))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            ContextError::DatabaseError(format!("Failed to save conversation context: {}", e))
        })?;

        Ok(())
    }
}
