//! Focus indicator check.
//!
//! The capture records outline-style and box-shadow observed while each
//! focusable element held focus. An element with both set to `none` gives
//! keyboard users no cue at all.

use serde_json::json;

use crate::error::Result;
use crate::spec::CheckConfig;
use crate::types::{ElementInfo, PageCapture, ProtoIssue};

use super::Evaluator;

pub struct FocusIndicators;

impl Evaluator for FocusIndicators {
    fn check_id(&self) -> &'static str {
        "focus-indicators"
    }

    fn evaluate(&self, capture: &PageCapture, _config: &CheckConfig) -> Result<Vec<ProtoIssue>> {
        let mut issues = Vec::new();

        for (handle, element) in capture.elements.iter().enumerate() {
            if !element.is_visible() || !is_focusable(element) {
                continue;
            }
            let Some(focus) = element.focus_styles.as_ref() else {
                continue;
            };

            let outline = focus.outline_style.as_deref().unwrap_or("none");
            let shadow = focus.box_shadow.as_deref().unwrap_or("none");
            if is_none_value(outline) && is_none_value(shadow) {
                let issue = ProtoIssue::for_element(
                    handle,
                    element.bounding_box,
                    "No visible focus indicator: outline and box-shadow are both none",
                )
                .with_recommendation(
                    "Add a :focus-visible outline or box-shadow so keyboard focus is visible",
                )
                .with_detail("outlineStyle", json!(outline))
                .with_detail("boxShadow", json!(shadow));
                issues.push(issue);
            }
        }

        Ok(issues)
    }
}

fn is_focusable(element: &ElementInfo) -> bool {
    if element.attribute("tabindex").is_some() {
        return true;
    }
    match element.tag.to_ascii_lowercase().as_str() {
        "button" | "input" | "select" | "textarea" => true,
        "a" => element.attribute("href").is_some(),
        _ => false,
    }
}

fn is_none_value(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    v.is_empty() || v == "none"
}
