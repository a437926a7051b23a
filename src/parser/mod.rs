//! Turn Parser
//!
//! Extracts context signals from one conversation turn:
//! - Corrections: the user replacing a value ("sorry, I meant X not Y")
//! - Entity references: product links and order numbers
//! - Numbered lists: items the user can later pick by position
//!
//! Stateless and side-effect free; the same input always gives the same output.

pub mod corrections;
pub mod entities;
pub mod lists;

use crate::models::{ListItem, NewCorrection, NewEntity};

/// Signals extracted from a single turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTurn {
    pub corrections: Vec<NewCorrection>,
    pub entity_refs: Vec<NewEntity>,
    pub lists: Vec<Vec<ListItem>>,
}

impl ParsedTurn {
    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty() && self.entity_refs.is_empty() && self.lists.is_empty()
    }
}

/// Turn parser
pub struct TurnParser;

impl TurnParser {
    /// Parse a user message and the agent's response to it
    pub fn parse_turn(user_message: &str, agent_response: &str, turn_number: u32) -> ParsedTurn {
        let corrections = corrections::detect_correction(user_message, turn_number)
            .into_iter()
            .collect();

        let mut entity_refs = entities::extract_link_entities(agent_response);
        for order in entities::extract_order_entities(agent_response)
            .into_iter()
            .chain(entities::extract_order_entities(user_message))
        {
            let seen = entity_refs
                .iter()
                .any(|e| e.entity_type == order.entity_type && e.value == order.value);
            if !seen {
                entity_refs.push(order);
            }
        }

        ParsedTurn {
            corrections,
            entity_refs,
            lists: lists::extract_lists(agent_response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_links_scenario() {
        let parsed = TurnParser::parse_turn(
            "do you have pumps?",
            "We have [Pump A](https://x/a) and [Pump B](https://x/b).",
            1,
        );

        assert!(parsed.corrections.is_empty());
        assert!(parsed.lists.is_empty());
        let values: Vec<&str> = parsed.entity_refs.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["Pump A", "Pump B"]);
    }

    #[test]
    fn test_correction_scenario() {
        let parsed = TurnParser::parse_turn("Sorry I meant ZF4 not ZF5", "Got it, ZF4 it is.", 3);

        assert_eq!(parsed.corrections.len(), 1);
        let correction = &parsed.corrections[0];
        assert_eq!(correction.turn_number, Some(3));
        assert_eq!(correction.original_value, "ZF5");
        assert_eq!(correction.corrected_value, "ZF4");
    }

    #[test]
    fn test_orders_from_both_sides_are_deduplicated() {
        let parsed = TurnParser::parse_turn(
            "where is order #12345?",
            "Order #12345 is out for delivery. Order #777 has not shipped yet.",
            2,
        );

        let values: Vec<&str> = parsed.entity_refs.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["Order #12345", "Order #777"]);
    }

    #[test]
    fn test_list_with_links_yields_list_and_entities() {
        let parsed = TurnParser::parse_turn(
            "show me pumps",
            "1. [Pump A](https://x/a)\n2. [Pump B](https://x/b)\n3. Pump C",
            1,
        );

        assert_eq!(parsed.lists.len(), 1);
        assert_eq!(parsed.lists[0].len(), 3);
        assert_eq!(parsed.entity_refs.len(), 2);
    }

    #[test]
    fn test_parse_is_repeatable() {
        let first = TurnParser::parse_turn("not A but B", "- x\n- y", 4);
        let second = TurnParser::parse_turn("not A but B", "- x\n- y", 4);
        assert_eq!(first, second);
        assert!(!first.is_empty());
        assert!(TurnParser::parse_turn("hi", "hello!", 1).is_empty());
    }
}
