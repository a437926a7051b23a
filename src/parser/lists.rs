//! Numbered list detection
//!
//! A list is a contiguous run of at least two ordered (`1.`, `2)`) or
//! bulleted (`-`, `*`, `•`) lines at the same indentation. Shorter runs
//! read as ordinary prose.

use crate::models::{ListItem, Metadata};
use crate::parser::entities::{clean_link_text, is_non_product_link, LinkRef, MARKDOWN_LINK};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LIST_LINE: Regex =
        Regex::new(r"^\s*(?:\d{1,3}[.)]|[-*•+])\s+(.+?)\s*$").expect("valid list line pattern");
}

const MIN_LIST_ITEMS: usize = 2;

/// Separators between an item's name and its description
const DESCRIPTION_SEPARATORS: &[&str] = &[" - ", " – ", " — ", ": "];

/// Every list in the agent response, in order of appearance
///
/// The first item line fixes the run's indentation. Lines indented deeper
/// than that are details of the item above: they neither become items nor
/// end the run, and are folded into its `description`.
pub fn extract_lists(agent_response: &str) -> Vec<Vec<ListItem>> {
    let mut lists = Vec::new();
    let mut run: Vec<ListItem> = Vec::new();
    let mut run_indent: Option<usize> = None;

    for line in agent_response.lines() {
        let indent = indent_width(line);

        if let (Some(base), Some(parent)) = (run_indent, run.last_mut()) {
            if indent > base && !line.trim().is_empty() {
                append_detail(parent, line);
                continue;
            }
        }

        let item = LIST_LINE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|content| parse_item(run.len() + 1, content.as_str()));

        match item {
            Some(item) => {
                if run_indent.is_some_and(|base| indent < base) {
                    flush_run(&mut run, &mut lists);
                }
                if run.is_empty() {
                    run_indent = Some(indent);
                }
                run.push(ListItem {
                    position: run.len() + 1,
                    ..item
                });
            }
            None => {
                flush_run(&mut run, &mut lists);
                run_indent = None;
            }
        }
    }
    flush_run(&mut run, &mut lists);

    lists
}

fn flush_run(run: &mut Vec<ListItem>, lists: &mut Vec<Vec<ListItem>>) {
    let items = std::mem::take(run);
    if items.len() >= MIN_LIST_ITEMS {
        lists.push(items);
    }
}

/// Leading whitespace width, tabs counting as four columns
fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Fold a nested bullet or continuation line into the item's description
fn append_detail(item: &mut ListItem, line: &str) {
    let content = LIST_LINE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map_or(line.trim(), |content| content.as_str());
    let detail = clean_link_text(content);
    if detail.is_empty() {
        return;
    }

    let description = match item.metadata.get("description").and_then(|d| d.as_str()) {
        Some(existing) => format!("{}; {}", existing, detail),
        None => detail,
    };
    item.metadata.insert("description".to_string(), description.into());
}

/// Build an item from a line's content; an embedded link supplies the value
fn parse_item(position: usize, content: &str) -> Option<ListItem> {
    let mut metadata = Metadata::new();

    let link = MARKDOWN_LINK.captures(content).and_then(|caps| {
        Some((caps.get(0)?, LinkRef {
            text: caps.get(1)?.as_str(),
            url: caps.get(2)?.as_str(),
        }))
    });

    let value = match link {
        Some((span, link)) => {
            if !is_non_product_link(&link) {
                metadata.insert("url".to_string(), link.url.into());
            }
            let rest = strip_leading_separator(&content[span.end()..]);
            if !rest.is_empty() {
                metadata.insert("description".to_string(), rest.into());
            }
            clean_link_text(link.text)
        }
        None => {
            let content = clean_link_text(content);
            match split_description(&content) {
                Some((name, description)) => {
                    metadata.insert("description".to_string(), description.into());
                    name.to_string()
                }
                None => content,
            }
        }
    };

    if value.is_empty() {
        return None;
    }

    Some(ListItem {
        position,
        value,
        metadata,
    })
}

fn split_description(content: &str) -> Option<(&str, &str)> {
    DESCRIPTION_SEPARATORS
        .iter()
        .filter_map(|sep| content.find(sep).map(|at| (at, sep.len())))
        .min_by_key(|(at, _)| *at)
        .map(|(at, len)| (content[..at].trim(), content[at + len..].trim()))
        .filter(|(name, description)| !name.is_empty() && !description.is_empty())
}

fn strip_leading_separator(rest: &str) -> &str {
    rest.trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '–' | '—' | ':' | ','))
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(list: &[ListItem]) -> Vec<&str> {
        list.iter().map(|item| item.value.as_str()).collect()
    }

    #[test]
    fn test_numbered_list() {
        let lists = extract_lists("Here you go:\n1. Pump A\n2. Pump B\n3. Pump C\nAnything else?");

        assert_eq!(lists.len(), 1);
        assert_eq!(values(&lists[0]), vec!["Pump A", "Pump B", "Pump C"]);
        assert_eq!(lists[0][2].position, 3);
    }

    #[test]
    fn test_bulleted_list_with_links_and_descriptions() {
        let response = "- [Pump A](https://x/a) - 2 HP, $450\n* **Valve B**: brass, 1 inch\n• Plain item";
        let lists = extract_lists(response);

        assert_eq!(lists.len(), 1);
        let list = &lists[0];
        assert_eq!(values(list), vec!["Pump A", "Valve B", "Plain item"]);
        assert_eq!(list[0].metadata["url"], "https://x/a");
        assert_eq!(list[0].metadata["description"], "2 HP, $450");
        assert_eq!(list[1].metadata["description"], "brass, 1 inch");
        assert!(list[2].metadata.is_empty());
    }

    #[test]
    fn test_single_line_is_not_a_list() {
        assert!(extract_lists("1. Only one option here").is_empty());
        assert!(extract_lists("No list at all.").is_empty());
    }

    #[test]
    fn test_blank_line_splits_runs() {
        let lists = extract_lists("1. A\n2. B\n\n- X\n- Y\n- Z");

        assert_eq!(lists.len(), 2);
        assert_eq!(values(&lists[0]), vec!["A", "B"]);
        assert_eq!(values(&lists[1]), vec!["X", "Y", "Z"]);
        assert_eq!(lists[1][0].position, 1);
    }

    #[test]
    fn test_nested_bullets_stay_with_their_item() {
        let lists = extract_lists("1. Pump A\n   - 2 HP\n   - $450\n2. Pump B\n   - 3 HP\n3. Pump C");

        assert_eq!(lists.len(), 1);
        let list = &lists[0];
        assert_eq!(values(list), vec!["Pump A", "Pump B", "Pump C"]);
        assert_eq!(list[1].position, 2);
        assert_eq!(list[0].metadata["description"], "2 HP; $450");
        assert_eq!(list[1].metadata["description"], "3 HP");
        assert!(list[2].metadata.is_empty());
    }

    #[test]
    fn test_indented_continuation_lines_keep_the_run() {
        let lists = extract_lists("1. **Pump A**\n   Price: $450\n2. **Pump B**\n   Price: $520");

        assert_eq!(lists.len(), 1);
        assert_eq!(values(&lists[0]), vec!["Pump A", "Pump B"]);
        assert_eq!(lists[0][1].metadata["description"], "Price: $520");
    }

    #[test]
    fn test_mixed_markers_at_same_indent_form_one_run() {
        let lists = extract_lists("1. A\n- B\n2) C");
        assert_eq!(values(&lists[0]), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_positions_are_sequential_regardless_of_numbering() {
        let lists = extract_lists("3. C\n7. G");
        assert_eq!(lists[0][0].position, 1);
        assert_eq!(lists[0][1].position, 2);
    }
}
