//! Error types for the conversation context engine
//!
//! Only the persistence boundary can fail. Manager, parser and summarizer
//! operations are total and never produce these errors.

use thiserror::Error;

/// Result type alias for context engine operations
pub type Result<T> = std::result::Result<T, ContextError>;

#[derive(Error, Debug)]
pub enum ContextError {

    // =============================
    // Persistence Errors
    // =============================

    #[error("Database error: {0}")]
    DatabaseError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
