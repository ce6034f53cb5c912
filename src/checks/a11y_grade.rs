//! Aggregate accessibility grade from the in-page scan.

use serde_json::json;

use crate::error::{CvrError, Result};
use crate::spec::{config_str, CheckConfig};
use crate::types::{A11yImpact, A11yReport, Grade, PageCapture, ProtoIssue};

use super::Evaluator;

const DEFAULT_MINIMUM_GRADE: &str = "C";

pub struct AccessibilityGrade;

impl Evaluator for AccessibilityGrade {
    fn check_id(&self) -> &'static str {
        "accessibility-grade"
    }

    fn needs_a11y(&self) -> bool {
        true
    }

    fn evaluate(&self, capture: &PageCapture, config: &CheckConfig) -> Result<Vec<ProtoIssue>> {
        let report = capture.a11y.as_ref().ok_or_else(|| {
            CvrError::evaluator(self.check_id(), "capture has no accessibility scan")
        })?;

        let minimum_token = config_str(config, "minimum_grade", DEFAULT_MINIMUM_GRADE);
        let minimum = Grade::from_letter(minimum_token).ok_or_else(|| {
            CvrError::evaluator(
                self.check_id(),
                format!("minimum_grade '{minimum_token}' is not one of A, B, C, F"),
            )
        })?;

        let weighted = report.weighted_score();
        let grade = grade_from_weighted(weighted);

        if grade.is_at_least(minimum) {
            return Ok(vec![]);
        }

        let counts = impact_counts(report);
        let issue = ProtoIssue::page_level(format!(
            "Accessibility grade {grade} is below the required {minimum} ({} violation(s), weighted score {weighted})",
            report.violations.len()
        ))
        .with_recommendation("Fix critical and serious violations first; they dominate the weighted score")
        .with_detail("grade", json!(grade.to_string()))
        .with_detail("minimumGrade", json!(minimum.to_string()))
        .with_detail("weightedScore", json!(weighted))
        .with_detail("critical", json!(counts.0))
        .with_detail("serious", json!(counts.1))
        .with_detail("moderate", json!(counts.2))
        .with_detail("minor", json!(counts.3));
        Ok(vec![issue])
    }
}

/// Weighted score → letter grade: `critical*4 + serious*2 + moderate*1`,
/// A ≤ 0, B ≤ 3, C ≤ 10, F above.
pub fn grade_from_weighted(weighted: u32) -> Grade {
    match weighted {
        0 => Grade::A,
        1..=3 => Grade::B,
        4..=10 => Grade::C,
        _ => Grade::F,
    }
}

fn impact_counts(report: &A11yReport) -> (usize, usize, usize, usize) {
    let mut counts = (0, 0, 0, 0);
    for v in &report.violations {
        match v.impact {
            A11yImpact::Critical => counts.0 += 1,
            A11yImpact::Serious => counts.1 += 1,
            A11yImpact::Moderate => counts.2 += 1,
            A11yImpact::Minor => counts.3 += 1,
        }
    }
    counts
}
