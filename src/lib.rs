//! Conversation Context & Reference Resolution
//!
//! Lets a multi-turn agent keep track of what a conversation is about:
//! - Resolves pronouns ("it", "that one") to recently mentioned entities
//! - Resolves ordinals ("the second one", "item 2") against the last list shown
//! - Records user corrections ("I meant X not Y") as an append-only log
//! - Persists all of it between requests as one JSON document per conversation
//!
//! PER TURN:
//! LOAD → INCREMENT → SUMMARIZE → (model runs) → PARSE → APPLY → SAVE

pub mod audit;
pub mod config;
pub mod conversational;
pub mod error;
pub mod memory;
pub mod models;
pub mod parser;
pub mod state;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use config::EngineConfig;
pub use conversational::{ConversationContextEngine, TurnContext, TurnOutcome};
pub use memory::{ContextConfig, ContextManager};
pub use parser::{ParsedTurn, TurnParser};
