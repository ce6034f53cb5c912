//! WCAG text contrast check.

use serde_json::json;

use crate::color::{blend_over_background, contrast_ratio, parse_css_color, rgb_to_hex};
use crate::error::Result;
use crate::spec::{config_f64, CheckConfig};
use crate::types::{ElementInfo, PageCapture, ProtoIssue};

use super::Evaluator;

const DEFAULT_MINIMUM_RATIO: f64 = 4.5;

pub struct ColorContrast;

impl Evaluator for ColorContrast {
    fn check_id(&self) -> &'static str {
        "color-contrast"
    }

    fn evaluate(&self, capture: &PageCapture, config: &CheckConfig) -> Result<Vec<ProtoIssue>> {
        let minimum = config_f64(config, "minimum_ratio", DEFAULT_MINIMUM_RATIO) as f32;
        let mut issues = Vec::new();

        for (handle, element) in capture.elements.iter().enumerate() {
            if !element.is_visible() || !element.has_text() {
                continue;
            }
            let Some(fg) = element
                .styles
                .color
                .as_deref()
                .and_then(parse_css_color)
                .filter(|c| c[3] >= 0.05)
            else {
                continue;
            };

            let bg = effective_background(element);
            let fg_rgb = blend_over_background([fg[0], fg[1], fg[2]], bg, fg[3]);
            let ratio = contrast_ratio(fg_rgb, bg);

            if ratio < minimum {
                let issue = ProtoIssue::for_element(
                    handle,
                    element.bounding_box,
                    format!(
                        "Text contrast {ratio:.1}:1 is below the required {minimum:.1}:1"
                    ),
                )
                .with_recommendation(format!(
                    "Darken the text or lighten the background until the ratio reaches {minimum:.1}:1"
                ))
                .with_detail("ratio", json!(round1(ratio)))
                .with_detail("minimum", json!(round1(minimum)))
                .with_detail("fg", json!(rgb_to_hex(fg_rgb)))
                .with_detail("bg", json!(rgb_to_hex(bg)));
                issues.push(issue);
            }
        }

        Ok(issues)
    }
}

/// Walk up from the element until an opaque background is found; transparent
/// layers composite over their parent, and the fallback is white.
fn effective_background(element: &ElementInfo) -> [f32; 3] {
    let mut layers: Vec<[f32; 4]> = Vec::new();

    if let Some(own) = element
        .styles
        .background_color
        .as_deref()
        .and_then(parse_css_color)
    {
        if own[3] >= 0.95 {
            return [own[0], own[1], own[2]];
        }
        if own[3] > 0.0 {
            layers.push(own);
        }
    }

    for ancestor in &element.parent_chain {
        if let Some(bg) = ancestor
            .background_color
            .as_deref()
            .and_then(parse_css_color)
        {
            if bg[3] >= 0.95 {
                return composite_layers(&layers, [bg[0], bg[1], bg[2]]);
            }
            if bg[3] > 0.0 {
                layers.push(bg);
            }
        }
    }

    composite_layers(&layers, [1.0, 1.0, 1.0])
}

fn composite_layers(layers: &[[f32; 4]], base: [f32; 3]) -> [f32; 3] {
    let mut result = base;
    for layer in layers.iter().rev() {
        result = blend_over_background([layer[0], layer[1], layer[2]], result, layer[3]);
    }
    result
}

fn round1(v: f32) -> f64 {
    (v as f64 * 10.0).round() / 10.0
}
