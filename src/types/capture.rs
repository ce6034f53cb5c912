//! The page capture model.
//!
//! A capture is the read-only snapshot of a page taken once per review:
//! screenshot on disk, a bounded DOM tree, the accessibility scan, and a
//! flat element table in document order. Element handles are indices into
//! that table, so evaluator output stays serializable after the browser
//! context is gone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::viewport::Viewport;

/// Rectangle in viewport pixel coordinates at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Selected computed style properties captured per element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedStyles {
    pub color: Option<String>,
    pub background_color: Option<String>,
    pub font_size: Option<f32>,
    pub outline_style: Option<String>,
    pub box_shadow: Option<String>,
    pub display: Option<String>,
    pub visibility: Option<String>,
    pub opacity: Option<f32>,
}

/// Outline and shadow observed while the element held focus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusStyles {
    pub outline_style: Option<String>,
    pub box_shadow: Option<String>,
}

/// A compacted ancestor entry; the chain is capped at three levels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AncestorInfo {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

/// One captured element. The element's handle is its index in
/// [`PageCapture::elements`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub styles: ComputedStyles,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_styles: Option<FocusStyles>,
    pub bounding_box: BoundingBox,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_chain: Vec<AncestorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ElementInfo {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn role(&self) -> Option<&str> {
        self.attribute("role")
    }

    pub fn has_text(&self) -> bool {
        self.text
            .as_ref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }

    /// Rendered and occupying space, as far as the captured styles can tell.
    pub fn is_visible(&self) -> bool {
        if self.bounding_box.is_empty() {
            return false;
        }
        if self.styles.display.as_deref() == Some("none") {
            return false;
        }
        if self.styles.visibility.as_deref() == Some("hidden") {
            return false;
        }
        self.styles.opacity.map(|o| o > 0.05).unwrap_or(true)
    }
}

/// Bounded DOM tree node. Depth, child count, and text length limits are
/// applied when the tree is built from raw browser output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomNode {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DomNode>,
}

impl DomNode {
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(DomNode::count).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(DomNode::depth)
            .max()
            .unwrap_or(0)
    }
}

/// Impact levels reported by the in-page accessibility engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum A11yImpact {
    Critical,
    Serious,
    Moderate,
    Minor,
}

impl A11yImpact {
    /// Weight used by the accessibility grade aggregation.
    pub fn weight(&self) -> u32 {
        match self {
            A11yImpact::Critical => 4,
            A11yImpact::Serious => 2,
            A11yImpact::Moderate => 1,
            A11yImpact::Minor => 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct A11yNode {
    pub html: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct A11yViolation {
    pub id: String,
    pub impact: A11yImpact,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<A11yNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct A11yReport {
    pub violations: Vec<A11yViolation>,
}

impl A11yReport {
    pub fn weighted_score(&self) -> u32 {
        self.violations.iter().map(|v| v.impact.weight()).sum()
    }
}

/// The read-only page snapshot a review runs against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCapture {
    pub url: String,
    pub viewport: Viewport,
    pub timestamp: DateTime<Utc>,
    pub screenshot_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom: Option<DomNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a11y: Option<A11yReport>,
    pub elements: Vec<ElementInfo>,
}

impl PageCapture {
    pub fn element(&self, handle: usize) -> Option<&ElementInfo> {
        self.elements.get(handle)
    }
}
