//! Core data models for conversation context tracking

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open key-value bag attached to entities and list items
pub type Metadata = Map<String, Value>;

/// Metadata key linking a list item to a tracked entity
pub const ENTITY_ID_KEY: &str = "entity_id";

/// Pronouns every entity answers to
const GENERIC_ALIASES: &[&str] = &["it", "that", "this"];

/// Type-specific synonyms, on top of the generic `the <type>` alias
const TYPE_SYNONYMS: &[(&str, &[&str])] = &[
    ("product", &["the item", "that product", "this product"]),
    ("order", &["my order", "that order"]),
    ("category", &["that category"]),
];

//
// ================= Entity =================
//

/// Something the conversation can refer back to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub value: String,
    pub aliases: Vec<String>,
    /// Turn at which the entity was last mentioned
    pub turn_number: u32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Entity {
    /// Whether `token` (already lowercased) is one of this entity's aliases
    pub fn answers_to(&self, token: &str) -> bool {
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(token))
    }

    /// Add aliases not already present, keeping first-seen order
    pub fn merge_aliases<I, S>(&mut self, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for alias in aliases {
            let alias = alias.as_ref().trim().to_lowercase();
            if !alias.is_empty() && !self.aliases.contains(&alias) {
                self.aliases.push(alias);
            }
        }
    }

    /// Identity check used for duplicate detection
    pub fn same_referent(&self, entity_type: &str, value: &str) -> bool {
        self.entity_type.eq_ignore_ascii_case(entity_type)
            && self.value.to_lowercase() == value.to_lowercase()
    }
}

/// Aliases an entity of `entity_type` always carries
pub fn default_aliases(entity_type: &str) -> Vec<String> {
    let entity_type = entity_type.to_lowercase();
    let mut aliases: Vec<String> = GENERIC_ALIASES.iter().map(|a| a.to_string()).collect();
    aliases.push(format!("the {}", entity_type));

    if let Some((_, synonyms)) = TYPE_SYNONYMS.iter().find(|(t, _)| *t == entity_type) {
        aliases.extend(synonyms.iter().map(|s| s.to_string()));
    }

    aliases
}

/// Entity record handed to the manager for tracking
///
/// `id` is generated by the manager when absent. The turn number is always
/// stamped by the manager.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewEntity {
    pub id: Option<String>,
    pub entity_type: String,
    pub value: String,
    pub aliases: Vec<String>,
    pub metadata: Metadata,
}

impl NewEntity {
    pub fn new(entity_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

//
// ================= Correction =================
//

/// A user replacing one value with another. Append-only audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub turn_number: u32,
    pub original_value: String,
    pub corrected_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Correction handed to the manager; turn defaults to the current turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCorrection {
    pub turn_number: Option<u32>,
    pub original_value: String,
    pub corrected_value: String,
    pub context: Option<String>,
}

impl NewCorrection {
    pub fn new(original: impl Into<String>, corrected: impl Into<String>) -> Self {
        Self {
            turn_number: None,
            original_value: original.into(),
            corrected_value: corrected.into(),
            context: None,
        }
    }
}

//
// ================= Numbered lists =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    /// 1-indexed position in the list
    pub position: usize,
    pub value: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ListItem {
    pub fn new(position: usize, value: impl Into<String>) -> Self {
        Self {
            position,
            value: value.into(),
            metadata: Metadata::new(),
        }
    }

    /// Id of the tracked entity this item stands for, if linked
    pub fn entity_id(&self) -> Option<&str> {
        self.metadata.get(ENTITY_ID_KEY).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberedList {
    /// Turn at which the list was presented
    pub turn_number: u32,
    pub items: Vec<ListItem>,
}

impl NumberedList {
    pub fn item_at(&self, position: usize) -> Option<&ListItem> {
        self.items.iter().find(|item| item.position == position)
    }
}

//
// ================= Resolution =================
//

/// Outcome of resolving a reference token
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    Entity(&'a Entity),
    /// Active-list item with no tracked entity behind it
    ListItem(&'a ListItem),
    Unresolved,
}

impl<'a> Resolution<'a> {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }

    /// Display value of whatever the token resolved to
    pub fn value(&self) -> Option<&'a str> {
        match self {
            Resolution::Entity(entity) => Some(entity.value.as_str()),
            Resolution::ListItem(item) => Some(item.value.as_str()),
            Resolution::Unresolved => None,
        }
    }
}
