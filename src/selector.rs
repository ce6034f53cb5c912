//! CSS selector synthesis for captured elements.
//!
//! Selectors are hints for humans and downstream tooling, built from the
//! captured element table alone: an id wins outright, otherwise tag plus a
//! couple of meaningful classes, prefixed with up to three ancestors.
//! Uniqueness is best-effort; the function never fails and never returns
//! an empty string.

use crate::types::{AncestorInfo, ElementInfo};

/// Class-name prefixes treated as presentational utilities and excluded
/// from synthesized selectors. Exact prefixes, not substrings.
const UTILITY_PREFIXES: &[&str] = &[
    "flex", "grid", "p-", "m-", "text-", "bg-", "w-", "h-", "col-", "row-", "d-", "css-",
];

/// Ancestors contributed to the selector path, outermost first.
const MAX_ANCESTORS: usize = 3;

/// Classes used in the element's own selector segment.
const MAX_ELEMENT_CLASSES: usize = 2;

pub fn synthesize(element: &ElementInfo) -> String {
    if let Some(id) = non_empty(element.id.as_deref()) {
        return format!("#{id}");
    }

    let local = local_selector(&element.tag, &element.classes, MAX_ELEMENT_CLASSES);

    let mut path: Vec<String> = element
        .parent_chain
        .iter()
        .take(MAX_ANCESTORS)
        .map(ancestor_selector)
        .collect();
    path.reverse();
    path.push(local);
    path.join(" > ")
}

fn ancestor_selector(ancestor: &AncestorInfo) -> String {
    if let Some(id) = non_empty(ancestor.id.as_deref()) {
        return format!("#{id}");
    }
    local_selector(&ancestor.tag, &ancestor.classes, 1)
}

fn local_selector(tag: &str, classes: &[String], max_classes: usize) -> String {
    let tag = if tag.trim().is_empty() {
        "*".to_string()
    } else {
        tag.trim().to_ascii_lowercase()
    };

    let picked: Vec<&str> = classes
        .iter()
        .map(String::as_str)
        .filter(|c| !c.is_empty() && !is_utility_class(c))
        .take(max_classes)
        .collect();

    if picked.is_empty() {
        tag
    } else {
        format!("{tag}.{}", picked.join("."))
    }
}

fn is_utility_class(class: &str) -> bool {
    UTILITY_PREFIXES
        .iter()
        .any(|prefix| class.starts_with(prefix))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
