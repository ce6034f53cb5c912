//! Raw browser-helper output and its conversion into [`PageCapture`].

use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::budget::truncate_chars;
use crate::types::{
    A11yImpact, A11yNode, A11yReport, A11yViolation, AncestorInfo, BoundingBox, ComputedStyles,
    DomNode, ElementInfo, FocusStyles, PageCapture,
};
use crate::viewport::Viewport;

/// Bounds applied to the converted capture.
pub(crate) const MAX_PARENT_CHAIN: usize = 3;
pub(crate) const MAX_ELEMENT_TEXT: usize = 100;
pub(crate) const MAX_DOM_DEPTH: usize = 5;
pub(crate) const MAX_DOM_CHILDREN: usize = 20;
pub(crate) const MAX_DOM_TEXT: usize = 100;

#[derive(Debug, Deserialize)]
pub(crate) struct RawCapture {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub elements: Vec<RawElement>,
    #[serde(default)]
    pub dom: Option<RawDomNode>,
    #[serde(default)]
    pub a11y: Option<RawA11yReport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawElement {
    pub tag: String,
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    pub styles: RawStyles,
    pub focus_styles: Option<RawFocusStyles>,
    pub bounding_box: RawBoundingBox,
    #[serde(default)]
    pub parent_chain: Vec<RawAncestor>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawStyles {
    pub color: Option<String>,
    pub background_color: Option<String>,
    pub font_size: Option<f32>,
    pub outline_style: Option<String>,
    pub box_shadow: Option<String>,
    pub display: Option<String>,
    pub visibility: Option<String>,
    pub opacity: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawFocusStyles {
    pub outline_style: Option<String>,
    pub box_shadow: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawAncestor {
    pub tag: String,
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    pub background_color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDomNode {
    pub tag: String,
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<RawDomNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawA11yReport {
    #[serde(default)]
    pub violations: Vec<RawA11yViolation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawA11yViolation {
    pub id: String,
    pub impact: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nodes: Vec<RawA11yNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawA11yNode {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub target: Vec<String>,
}

pub(crate) fn convert_capture(
    raw: RawCapture,
    url: &str,
    viewport: Viewport,
    screenshot_path: &Path,
) -> PageCapture {
    let elements = raw
        .elements
        .into_iter()
        .map(convert_element)
        .collect::<Vec<_>>();

    PageCapture {
        url: url.to_string(),
        viewport,
        timestamp: Utc::now(),
        screenshot_path: screenshot_path.to_path_buf(),
        dom: raw.dom.map(|d| convert_dom(d, 1)),
        a11y: raw.a11y.map(convert_a11y),
        elements,
    }
}

fn convert_element(raw: RawElement) -> ElementInfo {
    ElementInfo {
        tag: raw.tag,
        id: raw.id.filter(|s| !s.is_empty()),
        classes: raw.classes,
        attributes: raw.attributes,
        styles: ComputedStyles {
            color: raw.styles.color,
            background_color: raw.styles.background_color,
            font_size: raw.styles.font_size,
            outline_style: raw.styles.outline_style,
            box_shadow: raw.styles.box_shadow,
            display: raw.styles.display,
            visibility: raw.styles.visibility,
            opacity: raw.styles.opacity,
        },
        focus_styles: raw.focus_styles.map(|f| FocusStyles {
            outline_style: f.outline_style,
            box_shadow: f.box_shadow,
        }),
        bounding_box: BoundingBox {
            x: raw.bounding_box.x,
            y: raw.bounding_box.y,
            width: raw.bounding_box.width,
            height: raw.bounding_box.height,
        },
        parent_chain: raw
            .parent_chain
            .into_iter()
            .take(MAX_PARENT_CHAIN)
            .map(|a| AncestorInfo {
                tag: a.tag,
                id: a.id.filter(|s| !s.is_empty()),
                classes: a.classes,
                background_color: a.background_color,
            })
            .collect(),
        text: raw
            .text
            .map(|t| truncate_chars(&t, MAX_ELEMENT_TEXT))
            .filter(|t| !t.is_empty()),
    }
}

fn convert_dom(raw: RawDomNode, depth: usize) -> DomNode {
    let children = if depth >= MAX_DOM_DEPTH {
        Vec::new()
    } else {
        raw.children
            .into_iter()
            .take(MAX_DOM_CHILDREN)
            .map(|c| convert_dom(c, depth + 1))
            .collect()
    };
    DomNode {
        tag: raw.tag,
        id: raw.id.filter(|s| !s.is_empty()),
        classes: raw.classes,
        text: raw
            .text
            .map(|t| truncate_chars(&t, MAX_DOM_TEXT))
            .filter(|t| !t.is_empty()),
        children,
    }
}

fn convert_a11y(raw: RawA11yReport) -> A11yReport {
    A11yReport {
        violations: raw
            .violations
            .into_iter()
            .map(|v| A11yViolation {
                id: v.id,
                impact: parse_impact(v.impact.as_deref()),
                description: v.description,
                nodes: v
                    .nodes
                    .into_iter()
                    .map(|n| A11yNode {
                        html: n.html,
                        target: n.target,
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn parse_impact(impact: Option<&str>) -> A11yImpact {
    match impact.map(str::to_ascii_lowercase).as_deref() {
        Some("critical") => A11yImpact::Critical,
        Some("serious") => A11yImpact::Serious,
        Some("moderate") => A11yImpact::Moderate,
        _ => A11yImpact::Minor,
    }
}
