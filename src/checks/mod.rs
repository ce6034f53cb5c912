//! Check evaluators and the registry that maps check ids onto them.
//!
//! An evaluator is a pure function over `(capture, config)`: it reads the
//! captured snapshot, never the live browser, and returns zero or more
//! proto-issues in document order. That keeps every check reproducible from
//! a serialized capture.

mod a11y_grade;
mod alt_text;
mod contrast;
mod focus;
mod touch_targets;

use std::collections::HashMap;

use crate::error::Result;
use crate::spec::CheckConfig;
use crate::types::{PageCapture, ProtoIssue};

pub use a11y_grade::AccessibilityGrade;
pub use alt_text::AltText;
pub use contrast::ColorContrast;
pub use focus::FocusIndicators;
pub use touch_targets::TouchTargets;

pub trait Evaluator: Send + Sync {
    fn check_id(&self) -> &'static str;

    /// Whether this evaluator reads the capture's accessibility scan. When
    /// the scan is missing the orchestrator skips the check instead of
    /// invoking it.
    fn needs_a11y(&self) -> bool {
        false
    }

    fn evaluate(&self, capture: &PageCapture, config: &CheckConfig) -> Result<Vec<ProtoIssue>>;
}

/// Maps check ids to evaluators. Checks without a registered evaluator are
/// human-review items and produce a `Skipped` diagnostic.
pub struct CheckRegistry {
    evaluators: HashMap<&'static str, Box<dyn Evaluator>>,
}

impl CheckRegistry {
    pub fn empty() -> Self {
        Self {
            evaluators: HashMap::new(),
        }
    }

    /// Registry with all built-in evaluators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ColorContrast));
        registry.register(Box::new(TouchTargets));
        registry.register(Box::new(FocusIndicators));
        registry.register(Box::new(AltText));
        registry.register(Box::new(AccessibilityGrade));
        registry
    }

    pub fn register(&mut self, evaluator: Box<dyn Evaluator>) {
        self.evaluators.insert(evaluator.check_id(), evaluator);
    }

    pub fn get(&self, check_id: &str) -> Option<&dyn Evaluator> {
        self.evaluators.get(check_id).map(|b| b.as_ref())
    }

    pub fn contains(&self, check_id: &str) -> bool {
        self.evaluators.contains_key(check_id)
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_all_five_checks() {
        let registry = CheckRegistry::with_builtins();
        for id in [
            "color-contrast",
            "touch-targets",
            "focus-indicators",
            "alt-text",
            "accessibility-grade",
        ] {
            assert!(registry.contains(id), "missing builtin {id}");
        }
        assert!(!registry.contains("brand-colors"));
    }

    #[test]
    fn only_the_grade_check_needs_a11y() {
        let registry = CheckRegistry::with_builtins();
        assert!(registry.get("accessibility-grade").unwrap().needs_a11y());
        assert!(!registry.get("color-contrast").unwrap().needs_a11y());
    }

    struct Custom;
    impl Evaluator for Custom {
        fn check_id(&self) -> &'static str {
            "brand-colors"
        }
        fn evaluate(
            &self,
            _capture: &crate::types::PageCapture,
            _config: &crate::spec::CheckConfig,
        ) -> crate::error::Result<Vec<crate::types::ProtoIssue>> {
            Ok(vec![])
        }
    }

    #[test]
    fn consumers_can_register_custom_evaluators() {
        let mut registry = CheckRegistry::with_builtins();
        registry.register(Box::new(Custom));
        assert!(registry.contains("brand-colors"));
    }
}
