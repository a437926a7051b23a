//! Conversation state storage
//!
//! Holds the per-conversation entities, corrections, numbered lists and turn
//! counter, and the lossless document codec used between turns.

use crate::models::{Correction, Entity, NumberedList};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-conversation context state
///
/// Entities keep mention order: the last entry is the most recently
/// mentioned one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    #[serde(with = "entity_pairs", default)]
    pub entities: IndexMap<String, Entity>,
    #[serde(default)]
    pub corrections: Vec<Correction>,
    #[serde(default)]
    pub lists: Vec<NumberedList>,
    pub current_turn: u32,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode as the persisted JSON document
    pub fn to_document(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a persisted document
    ///
    /// Missing or malformed documents yield a fresh state; this never fails.
    pub fn from_document(document: Option<&str>) -> Self {
        let Some(raw) = document else {
            return Self::new();
        };

        match serde_json::from_str::<ConversationState>(raw) {
            Ok(mut state) => {
                state.reconcile_ids();
                state
            }
            Err(error) => {
                warn!("Discarding unreadable conversation state, starting fresh: {}", error);
                Self::new()
            }
        }
    }

    /// Pair keys are authoritative over the ids embedded in entities
    fn reconcile_ids(&mut self) {
        for (id, entity) in self.entities.iter_mut() {
            if entity.id != *id {
                entity.id = id.clone();
            }
        }
    }

    /// The most recently created list
    pub fn active_list(&self) -> Option<&NumberedList> {
        self.lists.last()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.corrections.is_empty() && self.lists.is_empty()
    }
}

/// Entities travel as an ordered array of `[id, entity]` pairs
mod entity_pairs {
    use crate::models::Entity;
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(entities: &IndexMap<String, Entity>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let pairs: Vec<(&String, &Entity)> = entities.iter().collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<IndexMap<String, Entity>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(String, Entity)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
