//! Conversation Context Memory
//!
//! Tracks what a conversation has talked about (entities, corrections,
//! numbered lists) so later turns can refer back to it

pub mod store;
pub mod summarizer;
pub mod context_manager;

pub use store::ConversationState;
pub use summarizer::ContextSummarizer;
pub use context_manager::{ContextConfig, ContextManager, ResolvedMention};
