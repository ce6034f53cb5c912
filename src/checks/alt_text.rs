//! Image alt text check.

use serde_json::json;

use crate::error::Result;
use crate::spec::CheckConfig;
use crate::types::{PageCapture, ProtoIssue, Severity};

use super::Evaluator;

/// Alt text shorter than this is assumed to be a placeholder.
const MIN_MEANINGFUL_LEN: usize = 5;

pub struct AltText;

impl Evaluator for AltText {
    fn check_id(&self) -> &'static str {
        "alt-text"
    }

    fn evaluate(&self, capture: &PageCapture, _config: &CheckConfig) -> Result<Vec<ProtoIssue>> {
        let mut issues = Vec::new();

        for (handle, element) in capture.elements.iter().enumerate() {
            if !element.tag.eq_ignore_ascii_case("img") || !element.is_visible() {
                continue;
            }

            match element.attribute("alt") {
                None => {
                    let issue = ProtoIssue::for_element(
                        handle,
                        element.bounding_box,
                        "Image is missing an alt attribute",
                    )
                    .with_severity(Severity::Blocking)
                    .with_recommendation(
                        "Add alt text describing the image, or alt=\"\" if purely decorative",
                    )
                    .with_detail("src", json!(element.attribute("src").unwrap_or("")));
                    issues.push(issue);
                }
                Some(alt) if alt.trim().chars().count() < MIN_MEANINGFUL_LEN => {
                    let issue = ProtoIssue::for_element(
                        handle,
                        element.bounding_box,
                        format!(
                            "Alt text \"{}\" is too short to describe the image",
                            alt.trim()
                        ),
                    )
                    .with_severity(Severity::Minor)
                    .with_recommendation("Expand the alt text to a meaningful description")
                    .with_detail("alt", json!(alt))
                    .with_detail("minimumLength", json!(MIN_MEANINGFUL_LEN));
                    issues.push(issue);
                }
                Some(_) => {}
            }
        }

        Ok(issues)
    }
}
