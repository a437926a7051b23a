//! Conversation Context Management
//!
//! Owns the per-conversation state and answers reference queries against it:
//! pronouns resolve to recently mentioned entities, ordinals resolve against
//! the active numbered list.

use crate::memory::store::ConversationState;
use crate::memory::summarizer::ContextSummarizer;
use crate::models::{
    default_aliases, Correction, Entity, ListItem, NewCorrection, NewEntity, NumberedList,
    Resolution, ENTITY_ID_KEY,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

lazy_static! {
    /// "first", "the second one", "3rd item", "last option"
    static ref ORDINAL_TOKEN: Regex = Regex::new(
        r"^(?:the\s+)?(first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|last|\d{1,2}(?:st|nd|rd|th))(?:\s+(?:one|item|option))?$"
    )
    .expect("valid ordinal token pattern");

    /// "item 2", "option 3", "number 1", "#2"
    static ref POSITION_TOKEN: Regex =
        Regex::new(r"^(?:(?:item|option|number|no\.?)\s*|#)(\d{1,3})$").expect("valid position token pattern");

    /// Ordinal phrases inside free text; a bare "first" is too noisy here
    static ref ORDINAL_MENTION: Regex = Regex::new(
        r"\b(?:the\s+)?(?:first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|last|\d{1,2}(?:st|nd|rd|th))\s+(?:one|item|option)\b|\b(?:item|option|number)\s+\d{1,3}\b"
    )
    .expect("valid ordinal mention pattern");
}

const ORDINAL_WORDS: &[&str] = &[
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

/// Configuration for reference resolution
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Trailing turns within which an entity stays resolvable by alias
    pub recency_window: u32,
    /// Entities listed in the context summary
    pub max_summary_entities: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recency_window: 3,
            max_summary_entities: 10,
        }
    }
}

/// Position reference into the active list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListPosition {
    At(usize),
    Last,
}

/// A reference found inside a user message, with what it resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMention<'a> {
    pub token: String,
    pub resolution: Resolution<'a>,
}

/// Manages one conversation's entities, corrections and lists
#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    config: ContextConfig,
    state: ConversationState,
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            config,
            state: ConversationState::new(),
        }
    }

    pub fn from_state(state: ConversationState, config: ContextConfig) -> Self {
        Self { config, state }
    }

    /// Rebuild a manager from a persisted document; never fails
    pub fn deserialize(document: Option<&str>, config: ContextConfig) -> Self {
        Self::from_state(ConversationState::from_document(document), config)
    }

    pub fn serialize(&self) -> crate::Result<String> {
        self.state.to_document()
    }

    // =============================
    // Turn lifecycle
    // =============================

    /// Advance to the next turn; call once per turn before tracking anything
    pub fn increment_turn(&mut self) -> u32 {
        self.state.current_turn += 1;
        self.state.current_turn
    }

    pub fn current_turn(&self) -> u32 {
        self.state.current_turn
    }

    // =============================
    // Tracking
    // =============================

    /// Track an entity, refreshing an existing one with the same type and value
    pub fn track_entity(&mut self, mut entity: NewEntity) -> &Entity {
        let turn = self.state.current_turn;
        entity.value = entity.value.trim().to_string();

        let existing = self
            .state
            .entities
            .values()
            .position(|e| e.same_referent(&entity.entity_type, &entity.value));

        if let Some((id, mut tracked)) =
            existing.and_then(|index| self.state.entities.shift_remove_index(index))
        {
            tracked.turn_number = turn;
            tracked.merge_aliases(&entity.aliases);
            tracked.metadata.extend(entity.metadata);
            debug!(entity_id = %id, turn, "Refreshed tracked entity");

            let (index, _) = self.state.entities.insert_full(id, tracked);
            return &self.state.entities[index];
        }

        let id = match entity.id {
            Some(id) if !id.is_empty() && !self.state.entities.contains_key(&id) => id,
            Some(id) if !id.is_empty() => {
                warn!(entity_id = %id, "Entity id already in use, generating a new one");
                self.next_entity_id(&entity.entity_type)
            }
            _ => self.next_entity_id(&entity.entity_type),
        };

        let mut tracked = Entity {
            id: id.clone(),
            entity_type: entity.entity_type.to_lowercase(),
            value: entity.value,
            aliases: Vec::new(),
            turn_number: turn,
            metadata: entity.metadata,
        };
        tracked.merge_aliases(default_aliases(&tracked.entity_type));
        tracked.merge_aliases([tracked.value.to_lowercase()]);
        tracked.merge_aliases(&entity.aliases);

        debug!(entity_id = %id, turn, value = %tracked.value, "Tracking new entity");

        let (index, _) = self.state.entities.insert_full(id, tracked);
        &self.state.entities[index]
    }

    /// `{type}_{n}`; entities are never removed so the count only grows
    fn next_entity_id(&self, entity_type: &str) -> String {
        let prefix = entity_type.trim().to_lowercase().replace(char::is_whitespace, "_");
        let mut sequence = self.state.entities.len() + 1;

        loop {
            let id = format!("{}_{}", prefix, sequence);
            if !self.state.entities.contains_key(&id) {
                return id;
            }
            sequence += 1;
        }
    }

    /// Append a correction to the audit log
    ///
    /// Returns `None` when either value is blank; nothing is recorded then.
    pub fn add_correction(&mut self, correction: NewCorrection) -> Option<&Correction> {
        let original_value = correction.original_value.trim();
        let corrected_value = correction.corrected_value.trim();

        if original_value.is_empty() || corrected_value.is_empty() {
            debug!("Ignoring correction with an empty value");
            return None;
        }

        self.state.corrections.push(Correction {
            turn_number: correction.turn_number.unwrap_or(self.state.current_turn),
            original_value: original_value.to_string(),
            corrected_value: corrected_value.to_string(),
            context: correction.context,
        });

        self.state.corrections.last()
    }

    /// Record a list shown to the user; it becomes the active list
    pub fn add_numbered_list(&mut self, items: Vec<ListItem>) -> &NumberedList {
        let items = items
            .into_iter()
            .enumerate()
            .map(|(index, mut item)| {
                item.position = index + 1;
                if item.entity_id().is_none() {
                    if let Some(entity) = self.find_entity_by_value(&item.value) {
                        item.metadata
                            .insert(ENTITY_ID_KEY.to_string(), entity.id.clone().into());
                    }
                }
                item
            })
            .collect::<Vec<_>>();

        debug!(turn = self.state.current_turn, items = items.len(), "Active list replaced");

        self.state.lists.push(NumberedList {
            turn_number: self.state.current_turn,
            items,
        });

        let last = self.state.lists.len() - 1;
        &self.state.lists[last]
    }

    // =============================
    // Resolution
    // =============================

    /// Resolve a reference token such as `it`, `the second one` or `item 2`
    pub fn resolve_reference(&self, token: &str) -> Resolution<'_> {
        let token = normalize_token(token);
        if token.is_empty() {
            return Resolution::Unresolved;
        }

        if let Some(position) = parse_list_position(&token) {
            return self.resolve_list_position(position);
        }

        if let Some(entity) = self.most_recent_with_alias(&token) {
            return Resolution::Entity(entity);
        }

        let shortened = token
            .strip_suffix(" one")
            .and_then(|stem| self.most_recent_with_alias(stem));

        match shortened {
            Some(entity) => Resolution::Entity(entity),
            None => Resolution::Unresolved,
        }
    }

    /// Find and resolve every reference inside a free-form user message
    ///
    /// Ordinal phrases are matched first; aliases of in-window entities fill
    /// the remaining text, longest alias first. Results follow text order.
    pub fn resolve_mentions(&self, text: &str) -> Vec<ResolvedMention<'_>> {
        let lowered = text.to_lowercase();
        let mut spans: Vec<(usize, usize)> = Vec::new();

        for found in ORDINAL_MENTION.find_iter(&lowered) {
            spans.push((found.start(), found.end()));
        }

        let mut aliases: Vec<&str> = self
            .state
            .entities
            .values()
            .filter(|e| self.in_window(e))
            .flat_map(|e| e.aliases.iter().map(String::as_str))
            .collect();
        aliases.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        aliases.dedup();

        for alias in aliases {
            for (start, _) in lowered.match_indices(alias) {
                let end = start + alias.len();
                let overlaps = spans.iter().any(|&(s, e)| start < e && s < end);
                if !overlaps && is_word_bounded(&lowered, start, end) {
                    spans.push((start, end));
                }
            }
        }

        spans.sort_unstable();
        spans
            .into_iter()
            .map(|(start, end)| {
                let token = lowered[start..end].to_string();
                let resolution = self.resolve_reference(&token);
                ResolvedMention { token, resolution }
            })
            .collect()
    }

    fn resolve_list_position(&self, position: ListPosition) -> Resolution<'_> {
        let Some(list) = self.state.active_list() else {
            return Resolution::Unresolved;
        };

        let item = match position {
            ListPosition::At(index) => list.item_at(index),
            ListPosition::Last => list.items.last(),
        };

        let Some(item) = item else {
            return Resolution::Unresolved;
        };

        let linked = item
            .entity_id()
            .and_then(|id| self.state.entities.get(id))
            .or_else(|| self.find_entity_by_value(&item.value));

        match linked {
            Some(entity) => Resolution::Entity(entity),
            None => Resolution::ListItem(item),
        }
    }

    /// Latest in-window entity answering to `alias`; later mentions win ties
    fn most_recent_with_alias(&self, alias: &str) -> Option<&Entity> {
        self.state
            .entities
            .values()
            .filter(|e| self.in_window(e) && e.answers_to(alias))
            .fold(None, |best: Option<&Entity>, candidate| match best {
                Some(current) if current.turn_number > candidate.turn_number => Some(current),
                _ => Some(candidate),
            })
    }

    fn in_window(&self, entity: &Entity) -> bool {
        self.state.current_turn.saturating_sub(entity.turn_number) <= self.config.recency_window
    }

    fn find_entity_by_value(&self, value: &str) -> Option<&Entity> {
        let value = value.trim().to_lowercase();
        self.state
            .entities
            .values()
            .rev()
            .find(|e| e.value.to_lowercase() == value)
    }

    // =============================
    // Read access
    // =============================

    /// Entities inside the recency window, most recent first
    pub fn recent_entities(&self) -> Vec<&Entity> {
        let mut recent: Vec<&Entity> = self
            .state
            .entities
            .values()
            .rev()
            .filter(|e| self.in_window(e))
            .collect();
        recent.sort_by(|a, b| b.turn_number.cmp(&a.turn_number));
        recent
    }

    /// Natural-language summary of the tracked context
    pub fn generate_context_summary(&self) -> String {
        ContextSummarizer::summarize(self)
    }

    pub fn get_entity(&self, id: &str) -> Option<&Entity> {
        self.state.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.state.entities.values()
    }

    pub fn corrections(&self) -> &[Correction] {
        &self.state.corrections
    }

    pub fn lists(&self) -> &[NumberedList] {
        &self.state.lists
    }

    pub fn active_list(&self) -> Option<&NumberedList> {
        self.state.active_list()
    }

    /// Newest correction that replaced `value`
    pub fn latest_correction_for(&self, value: &str) -> Option<&Correction> {
        let value = value.trim();
        self.state
            .corrections
            .iter()
            .rev()
            .find(|c| c.original_value.eq_ignore_ascii_case(value))
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }
}

/// Lowercase, collapse whitespace, drop surrounding quotes and trailing punctuation
fn normalize_token(token: &str) -> String {
    let collapsed = token
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    collapsed
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’'))
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
        .trim()
        .to_string()
}

fn parse_list_position(token: &str) -> Option<ListPosition> {
    if let Some(caps) = ORDINAL_TOKEN.captures(token) {
        let word = caps.get(1)?.as_str();
        if word == "last" {
            return Some(ListPosition::Last);
        }
        if let Some(index) = ORDINAL_WORDS.iter().position(|w| *w == word) {
            return Some(ListPosition::At(index + 1));
        }
        let digits: String = word.chars().take_while(char::is_ascii_digit).collect();
        return digits.parse().ok().map(ListPosition::At);
    }

    POSITION_TOKEN
        .captures(token)
        .and_then(|caps| caps.get(1))
        .and_then(|n| n.as_str().parse().ok())
        .map(ListPosition::At)
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(value: &str) -> NewEntity {
        NewEntity::new("product", value)
    }

    fn manager_at_turn_one() -> ContextManager {
        let mut manager = ContextManager::new();
        manager.increment_turn();
        manager
    }

    #[test]
    fn test_fresh_manager_starts_at_turn_zero() {
        let mut manager = ContextManager::new();
        assert_eq!(manager.current_turn(), 0);
        assert_eq!(manager.increment_turn(), 1);
        assert_eq!(manager.config().recency_window, 3);
    }

    #[test]
    fn test_track_entity_assigns_ids_and_aliases() {
        let mut manager = manager_at_turn_one();
        let entity = manager.track_entity(product("Pump A")).clone();

        assert_eq!(entity.id, "product_1");
        assert_eq!(entity.turn_number, 1);
        for alias in ["it", "that", "this", "the product", "pump a"] {
            assert!(entity.answers_to(alias), "missing alias {}", alias);
        }

        let order = manager.track_entity(NewEntity::new("order", "Order #12345"));
        assert_eq!(order.id, "order_2");
    }

    #[test]
    fn test_track_entity_refreshes_duplicate_value() {
        let mut manager = manager_at_turn_one();
        manager.track_entity(product("Pump A"));
        manager.track_entity(product("Pump B"));

        manager.increment_turn();
        let refreshed = manager
            .track_entity(product("pump a").with_alias("the blue pump"))
            .clone();

        assert_eq!(refreshed.id, "product_1");
        assert_eq!(manager.track_entity(product("  Pump A ")).id, "product_1");
        assert_eq!(refreshed.turn_number, 2);
        assert_eq!(refreshed.value, "Pump A");
        assert!(refreshed.answers_to("the blue pump"));
        assert_eq!(manager.entities().count(), 2);

        // Same value, different type is a different entity
        let category = manager.track_entity(NewEntity::new("category", "Pump A"));
        assert_eq!(category.id, "category_3");
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut manager = manager_at_turn_one();
        manager.track_entity(NewEntity {
            id: Some("product_2".to_string()),
            ..product("Pump A")
        });
        let second = manager.track_entity(product("Pump B")).id.clone();
        assert_eq!(second, "product_3");

        let clash = manager
            .track_entity(NewEntity {
                id: Some("product_2".to_string()),
                ..product("Pump C")
            })
            .id
            .clone();
        assert_ne!(clash, "product_2");
    }

    #[test]
    fn test_pronoun_resolves_to_latest_mention() {
        let mut manager = manager_at_turn_one();
        manager.track_entity(product("Pump A"));
        manager.track_entity(product("Pump B"));

        manager.increment_turn();
        assert_eq!(manager.resolve_reference("it").value(), Some("Pump B"));
        assert_eq!(manager.resolve_reference("That one").value(), Some("Pump B"));
        assert_eq!(manager.resolve_reference("pump a").value(), Some("Pump A"));

        manager.track_entity(product("Pump A"));
        assert_eq!(manager.resolve_reference("it").value(), Some("Pump A"));
    }

    #[test]
    fn test_recency_window() {
        let mut manager = manager_at_turn_one();
        manager.track_entity(product("Pump A"));

        for _ in 0..3 {
            manager.increment_turn();
            assert!(manager.resolve_reference("it").is_resolved());
        }

        manager.increment_turn();
        assert_eq!(manager.current_turn(), 5);
        assert_eq!(manager.resolve_reference("it"), Resolution::Unresolved);
    }

    #[test]
    fn test_stale_entity_falls_through_to_next_candidate() {
        let mut manager = manager_at_turn_one();
        manager.track_entity(product("Pump A"));
        manager.increment_turn();
        manager.track_entity(NewEntity::new("order", "Order #1"));

        for _ in 0..3 {
            manager.increment_turn();
        }

        assert_eq!(manager.resolve_reference("it").value(), Some("Order #1"));
        assert_eq!(manager.resolve_reference("the product"), Resolution::Unresolved);
    }

    #[test]
    fn test_ordinal_resolution_against_active_list() {
        let mut manager = manager_at_turn_one();
        manager.add_numbered_list(vec![
            ListItem::new(1, "A"),
            ListItem::new(2, "B"),
            ListItem::new(3, "C"),
        ]);

        for token in ["the second one", "item 2", "second", "2nd", "#2", "Option 2."] {
            assert_eq!(manager.resolve_reference(token).value(), Some("B"), "token {}", token);
        }
        assert_eq!(manager.resolve_reference("the last one").value(), Some("C"));
        assert_eq!(manager.resolve_reference("item 4"), Resolution::Unresolved);
    }

    #[test]
    fn test_ordinal_prefers_tracked_entity() {
        let mut manager = manager_at_turn_one();
        let pump_b = manager.track_entity(product("Pump B")).id.clone();
        manager.add_numbered_list(vec![ListItem::new(1, "Pump A"), ListItem::new(2, "Pump B")]);

        assert_eq!(manager.active_list().unwrap().items[1].entity_id(), Some(pump_b.as_str()));
        match manager.resolve_reference("item 2") {
            Resolution::Entity(entity) => assert_eq!(Some(entity), manager.get_entity(&pump_b)),
            other => panic!("expected entity, got {:?}", other),
        }
        assert!(matches!(manager.resolve_reference("first"), Resolution::ListItem(_)));
    }

    #[test]
    fn test_newest_list_supersedes_older() {
        let mut manager = manager_at_turn_one();
        manager.add_numbered_list(vec![ListItem::new(1, "A"), ListItem::new(2, "B")]);
        manager.increment_turn();
        manager.add_numbered_list(vec![ListItem::new(1, "X"), ListItem::new(2, "Y")]);

        assert_eq!(manager.lists().len(), 2);
        assert_eq!(manager.active_list().unwrap().turn_number, 2);
        assert_eq!(manager.resolve_reference("the first one").value(), Some("X"));
    }

    #[test]
    fn test_ordinal_without_list_is_unresolved() {
        let mut manager = manager_at_turn_one();
        manager.track_entity(product("Pump A"));
        assert_eq!(manager.resolve_reference("the first one"), Resolution::Unresolved);
        assert_eq!(manager.resolve_reference("   "), Resolution::Unresolved);
        assert_eq!(manager.resolve_reference("the widget"), Resolution::Unresolved);
    }

    #[test]
    fn test_corrections_are_append_only() {
        let mut manager = ContextManager::new();
        manager.increment_turn();
        manager.add_correction(NewCorrection::new("ZF5", "ZF4"));
        let first = manager.corrections()[0].clone();

        manager.increment_turn();
        manager.add_correction(NewCorrection::new("blue", "red"));

        assert_eq!(manager.corrections().len(), 2);
        assert_eq!(manager.corrections()[0], first);
        assert_eq!(manager.corrections()[1].turn_number, 2);
        assert_eq!(
            manager.latest_correction_for("zf5").map(|c| c.corrected_value.as_str()),
            Some("ZF4")
        );
    }

    #[test]
    fn test_correction_requires_values() {
        let mut manager = manager_at_turn_one();
        assert!(manager.add_correction(NewCorrection::new("  ", "ZF4")).is_none());
        assert!(manager.corrections().is_empty());

        let explicit = NewCorrection {
            turn_number: Some(7),
            ..NewCorrection::new("ZF5", "ZF4")
        };
        assert_eq!(manager.add_correction(explicit).unwrap().turn_number, 7);
    }

    #[test]
    fn test_resolve_mentions_in_message() {
        let mut manager = manager_at_turn_one();
        manager.track_entity(product("Pump A"));
        manager.add_numbered_list(vec![ListItem::new(1, "Pump A"), ListItem::new(2, "Valve")]);
        manager.increment_turn();

        let mentions = manager.resolve_mentions("Is it cheaper than the second one?");
        let tokens: Vec<&str> = mentions.iter().map(|m| m.token.as_str()).collect();
        assert_eq!(tokens, vec!["it", "the second one"]);
        assert_eq!(mentions[0].resolution.value(), Some("Pump A"));
        assert_eq!(mentions[1].resolution.value(), Some("Valve"));

        // "item" inside "items" is not a word match
        assert!(manager.resolve_mentions("show me items").is_empty());
    }

    #[test]
    fn test_serialize_round_trip_preserves_resolution() {
        let mut manager = manager_at_turn_one();
        manager.track_entity(product("Pump A"));
        manager.track_entity(product("Pump B"));
        manager.add_correction(NewCorrection::new("ZF5", "ZF4"));
        manager.add_numbered_list(vec![ListItem::new(1, "Pump A"), ListItem::new(2, "Pump B")]);

        let document = manager.serialize().unwrap();
        let restored = ContextManager::deserialize(Some(&document), ContextConfig::default());

        assert_eq!(restored.state(), manager.state());
        assert_eq!(restored.resolve_reference("it").value(), Some("Pump B"));
        assert_eq!(restored.resolve_reference("item 1").value(), Some("Pump A"));
    }
}
