//! Touch target sizing check.

use serde_json::json;

use crate::error::Result;
use crate::spec::{config_f64, CheckConfig};
use crate::types::{ElementInfo, PageCapture, ProtoIssue};

use super::Evaluator;

const DEFAULT_MINIMUM_SIZE: f64 = 44.0;

const INTERACTIVE_ROLES: &[&str] = &["button", "link", "menuitem"];

pub struct TouchTargets;

impl Evaluator for TouchTargets {
    fn check_id(&self) -> &'static str {
        "touch-targets"
    }

    fn evaluate(&self, capture: &PageCapture, config: &CheckConfig) -> Result<Vec<ProtoIssue>> {
        let minimum = config_f64(config, "minimum_size", DEFAULT_MINIMUM_SIZE) as f32;
        let mut issues = Vec::new();

        for (handle, element) in capture.elements.iter().enumerate() {
            if !element.is_visible() || !is_interactive(element) {
                continue;
            }
            let bbox = element.bounding_box;
            if bbox.min_side() < minimum {
                let issue = ProtoIssue::for_element(
                    handle,
                    bbox,
                    format!(
                        "Touch target is {:.0}x{:.0}px, below the {minimum:.0}px minimum",
                        bbox.width, bbox.height
                    ),
                )
                .with_recommendation(format!(
                    "Increase the hit area to at least {minimum:.0}x{minimum:.0}px"
                ))
                .with_detail("width", json!(bbox.width))
                .with_detail("height", json!(bbox.height))
                .with_detail("minimum", json!(minimum));
                issues.push(issue);
            }
        }

        Ok(issues)
    }
}

fn is_interactive(element: &ElementInfo) -> bool {
    match element.tag.to_ascii_lowercase().as_str() {
        "button" | "a" | "select" => return true,
        "input" => {
            let input_type = element
                .attribute("type")
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            if matches!(input_type.as_str(), "button" | "submit") {
                return true;
            }
        }
        _ => {}
    }
    element
        .role()
        .map(|role| INTERACTIVE_ROLES.contains(&role.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
