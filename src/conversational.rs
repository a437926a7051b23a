//! Conversation turn lifecycle
//!
//! Wires the context manager and turn parser to a context store:
//! load → increment turn → summarize at turn start, then
//! load → parse → apply → save at turn end.
//!
//! Each conversation's state is loaded fresh from the store on every call;
//! nothing is shared between conversations in memory.

use crate::config::EngineConfig;
use crate::memory::ContextManager;
use crate::parser::{ParsedTurn, TurnParser};
use crate::state::{build_store, ContextStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What the orchestrator gets at the start of a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnContext {
    pub conversation_id: Uuid,
    pub turn: u32,
    pub summary: String,
    /// Feature flag state; the orchestrator injects the summary only if set
    pub inject_summary: bool,
}

impl TurnContext {
    /// Summary to put in front of the model prompt, if any
    pub fn prompt_context(&self) -> Option<&str> {
        if self.inject_summary && !self.summary.is_empty() {
            Some(&self.summary)
        } else {
            None
        }
    }
}

/// What a finished turn added to the conversation context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub turn: u32,
    pub corrections_added: usize,
    pub entities_tracked: usize,
    pub lists_added: usize,
}

/// Conversation context engine consumed by the orchestrator
pub struct ConversationContextEngine {
    store: Arc<dyn ContextStore>,
    config: EngineConfig,
}

impl ConversationContextEngine {
    pub fn new(store: Arc<dyn ContextStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Engine configured from the environment, store picked by database URL
    pub fn from_env() -> Self {
        let config = EngineConfig::from_env();
        let store = build_store(config.database_url.as_deref());
        Self::new(store, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load a conversation's context; unreadable documents start fresh
    pub async fn load_manager(&self, conversation_id: Uuid) -> crate::Result<ContextManager> {
        let document = self.store.load(conversation_id).await?;
        if document.is_none() {
            debug!(conversation_id = %conversation_id, "No stored context, starting fresh");
        }

        Ok(ContextManager::deserialize(
            document.as_deref(),
            self.config.context.clone(),
        ))
    }

    async fn save_manager(&self, conversation_id: Uuid, manager: &ContextManager) -> crate::Result<()> {
        let document = manager.serialize()?;
        self.store.save(conversation_id, &document).await
    }

    /// Begin a turn: advance the turn counter and summarize the context
    ///
    /// The advanced counter is saved right away, so a turn that never
    /// reaches `process_turn_end` still consumes its number.
    pub async fn process_turn_start(&self, conversation_id: Uuid) -> crate::Result<TurnContext> {
        let mut manager = self.load_manager(conversation_id).await?;
        let turn = manager.increment_turn();
        let summary = manager.generate_context_summary();

        self.save_manager(conversation_id, &manager).await?;

        info!(
            conversation_id = %conversation_id,
            turn,
            summary_len = summary.len(),
            "Conversation turn started"
        );

        Ok(TurnContext {
            conversation_id,
            turn,
            summary,
            inject_summary: self.config.inject_context_summary,
        })
    }

    /// Finish a turn: extract signals from the exchange and persist them
    pub async fn process_turn_end(
        &self,
        conversation_id: Uuid,
        user_message: &str,
        agent_response: &str,
    ) -> crate::Result<TurnOutcome> {
        let mut manager = self.load_manager(conversation_id).await?;

        if manager.current_turn() == 0 {
            warn!(
                conversation_id = %conversation_id,
                "Turn ended without a start, advancing turn counter"
            );
            manager.increment_turn();
        }

        let parsed = TurnParser::parse_turn(user_message, agent_response, manager.current_turn());
        let outcome = apply_parsed_turn(&mut manager, parsed);

        self.save_manager(conversation_id, &manager).await?;

        info!(
            conversation_id = %conversation_id,
            turn = outcome.turn,
            corrections = outcome.corrections_added,
            entities = outcome.entities_tracked,
            lists = outcome.lists_added,
            "Conversation turn recorded"
        );

        Ok(outcome)
    }
}

/// Apply parsed signals to a manager: corrections, then entities, then lists
///
/// Entities go in before lists so list items can link to them.
pub fn apply_parsed_turn(manager: &mut ContextManager, parsed: ParsedTurn) -> TurnOutcome {
    let mut outcome = TurnOutcome {
        turn: manager.current_turn(),
        ..Default::default()
    };

    for correction in parsed.corrections {
        if manager.add_correction(correction).is_some() {
            outcome.corrections_added += 1;
        }
    }

    for entity in parsed.entity_refs {
        manager.track_entity(entity);
        outcome.entities_tracked += 1;
    }

    for items in parsed.lists {
        manager.add_numbered_list(items);
        outcome.lists_added += 1;
    }

    outcome
}
