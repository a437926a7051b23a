//! Entity reference extraction
//!
//! Markdown links in the agent response become product references unless
//! they point at documentation-like pages. Order numbers become order
//! references.

use crate::models::NewEntity;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `[display text](url)`
    pub(crate) static ref MARKDOWN_LINK: Regex =
        Regex::new(r"\[([^\[\]\n]+)\]\(([^()\s]+)\)").expect("valid link pattern");

    /// "order #12345", "order no. A-991", "order number 12345"
    static ref ORDER_REFERENCE: Regex = Regex::new(
        r"(?i)\border\s*(?:#\s*|no\.?\s*|number\s*)([a-z]{0,4}-?\d[a-z0-9-]*)"
    )
    .expect("valid order pattern");
}

/// Words marking a link as non-product content
const NON_PRODUCT_MARKERS: &[&str] = &["docs", "help", "support"];

pub const PRODUCT_TYPE: &str = "product";
pub const ORDER_TYPE: &str = "order";

/// A markdown link found in text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef<'a> {
    pub text: &'a str,
    pub url: &'a str,
}

/// All markdown links in `text`, in order of appearance
pub fn find_links(text: &str) -> impl Iterator<Item = LinkRef<'_>> {
    MARKDOWN_LINK.captures_iter(text).filter_map(|caps| {
        Some(LinkRef {
            text: caps.get(1)?.as_str(),
            url: caps.get(2)?.as_str(),
        })
    })
}

/// Whether a link points at docs/help/support content or a PDF
pub fn is_non_product_link(link: &LinkRef<'_>) -> bool {
    let url = link.url.to_lowercase();
    let path = url.split(['?', '#']).next().unwrap_or_default();
    if path.ends_with(".pdf") {
        return true;
    }

    let has_marker = |s: &str| {
        s.split(|c: char| !c.is_alphanumeric())
            .any(|word| NON_PRODUCT_MARKERS.contains(&word))
    };

    has_marker(path) || has_marker(&link.text.to_lowercase())
}

/// Product references from the links in the agent response
pub fn extract_link_entities(agent_response: &str) -> Vec<NewEntity> {
    let mut found: Vec<NewEntity> = Vec::new();

    for link in find_links(agent_response) {
        if is_non_product_link(&link) {
            tracing::debug!(url = link.url, "Skipping non-product link");
            continue;
        }

        let value = clean_link_text(link.text);
        if value.is_empty() {
            continue;
        }

        push_unique(
            &mut found,
            NewEntity::new(PRODUCT_TYPE, value).with_metadata("url", link.url),
        );
    }

    found
}

/// Order references in `text`
pub fn extract_order_entities(text: &str) -> Vec<NewEntity> {
    let mut found: Vec<NewEntity> = Vec::new();

    for caps in ORDER_REFERENCE.captures_iter(text) {
        let Some(number) = caps.get(1) else {
            continue;
        };
        let number = number.as_str().trim_end_matches('-').to_uppercase();

        let entity = NewEntity::new(ORDER_TYPE, format!("Order #{}", number))
            .with_alias(format!("order {}", number))
            .with_alias(format!("order #{}", number))
            .with_metadata("order_number", number);

        push_unique(&mut found, entity);
    }

    found
}

/// Link text without markdown emphasis
pub(crate) fn clean_link_text(text: &str) -> String {
    text.replace("**", "")
        .replace("__", "")
        .trim_matches(|c: char| c == '*' || c == '_' || c == '`')
        .trim()
        .to_string()
}

fn push_unique(found: &mut Vec<NewEntity>, entity: NewEntity) {
    let duplicate = found.iter().any(|e| {
        e.entity_type == entity.entity_type && e.value.eq_ignore_ascii_case(&entity.value)
    });
    if !duplicate {
        found.push(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_product_links() {
        let refs = extract_link_entities("We have [Pump A](https://x/a) and [**Pump B**](https://x/b).");

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].value, "Pump A");
        assert_eq!(refs[0].entity_type, "product");
        assert_eq!(refs[0].metadata["url"], "https://x/a");
        assert_eq!(refs[1].value, "Pump B");
    }

    #[test]
    fn test_skips_non_product_links() {
        let response = "See [the manual](https://x/manual.pdf?v=2), [Setup](https://docs.x.com/setup), \
                        [Contact us](https://x/support/contact), [Help Center](https://x/hc) \
                        and [Helpful Pump](https://helpful-pumps.com/p/1).";

        let refs = extract_link_entities(response);
        let values: Vec<&str> = refs.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["Helpful Pump"]);
    }

    #[test]
    fn test_duplicate_links_collapse() {
        let refs = extract_link_entities("[Pump A](https://x/a) ... again [pump a](https://x/a)");
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_extracts_order_references() {
        let refs = extract_order_entities("Your order #12345 shipped; order number ab-991 is pending.");

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].value, "Order #12345");
        assert_eq!(refs[0].entity_type, "order");
        assert!(refs[0].aliases.contains(&"order 12345".to_string()));
        assert_eq!(refs[1].value, "Order #AB-991");
        assert_eq!(refs[1].metadata["order_number"], "AB-991");
    }

    #[test]
    fn test_short_order_numbers() {
        let refs = extract_order_entities("Order #7 is ready and order #12 is packed.");
        let values: Vec<&str> = refs.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["Order #7", "Order #12"]);
    }

    #[test]
    fn test_order_words_without_numbers_are_ignored() {
        assert!(extract_order_entities("Place your order now, order notes are optional").is_empty());
    }
}
