//! Context Summarization
//!
//! Renders the tracked context as a text block an orchestrator can place in
//! front of a model prompt. Same state in, same text out.

use crate::memory::context_manager::ContextManager;
use std::fmt::Write;

/// Builds the natural-language context summary
pub struct ContextSummarizer;

impl ContextSummarizer {
    /// Summarize corrections, recent entities and the active list
    ///
    /// Empty sections are left out; an empty context gives an empty string.
    pub fn summarize(manager: &ContextManager) -> String {
        let sections: Vec<String> = [
            Self::format_corrections(manager),
            Self::format_recent_entities(manager),
            Self::format_active_list(manager),
        ]
        .into_iter()
        .flatten()
        .collect();

        if sections.is_empty() {
            return String::new();
        }

        let mut summary = format!("## Conversation Context (turn {})\n\n", manager.current_turn());
        summary.push_str(&sections.join("\n"));
        summary
    }

    fn format_corrections(manager: &ContextManager) -> Option<String> {
        let corrections = manager.corrections();
        if corrections.is_empty() {
            return None;
        }

        let mut section = String::from("### Corrections\n");
        for correction in corrections {
            let _ = writeln!(
                section,
                "- Turn {}: use \"{}\" instead of \"{}\"",
                correction.turn_number, correction.corrected_value, correction.original_value
            );
        }
        Some(section)
    }

    fn format_recent_entities(manager: &ContextManager) -> Option<String> {
        let recent = manager.recent_entities();
        if recent.is_empty() {
            return None;
        }

        let mut section = String::from("### Recently Mentioned\n");
        for entity in recent.into_iter().take(manager.config().max_summary_entities) {
            let _ = writeln!(
                section,
                "- {} ({}, turn {}): {}",
                entity.value,
                entity.entity_type,
                entity.turn_number,
                entity.aliases.join(", ")
            );
        }
        Some(section)
    }

    fn format_active_list(manager: &ContextManager) -> Option<String> {
        let list = manager.active_list().filter(|list| !list.items.is_empty())?;

        let mut section = format!("### Active List (turn {})\n", list.turn_number);
        for item in &list.items {
            let _ = writeln!(section, "{}. {}", item.position, item.value);
        }
        Some(section)
    }
}
