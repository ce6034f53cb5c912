//! Engine result payloads: full, compact, and the machine error envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::budget::{TokenBudget, COMPACT_TOKEN_TARGET};
use crate::compare::ComparisonResult;
use crate::error::ErrorPayload;
use crate::session::{ArtifactPaths, IssueSummary, SpecRef};
use crate::types::{Diagnostic, Issue, PillarGrade, SummaryCounts};

/// Result of a successful review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub ok: bool,
    pub session_id: String,
    pub url: String,
    pub spec: SpecRef,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub summary: SummaryCounts,
    pub pillar_grades: BTreeMap<String, PillarGrade>,
    pub issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    pub artifacts: ArtifactPaths,
}

impl ReviewResult {
    /// Token-lean projection: summary, clipped per-issue one-liners, and
    /// artifact paths. Raw details, recommendations, DOM, and a11y data are
    /// all dropped, and the issue list itself is capped by the token
    /// budgeter so the serialized result stays consumable.
    pub fn compact(&self) -> CompactReviewResult {
        let mut budget = TokenBudget::new(COMPACT_TOKEN_TARGET);
        let mut issues = Vec::with_capacity(self.issues.len());
        for issue in &self.issues {
            let summary = IssueSummary::from_issue(issue);
            if !budget.charge(&format!(
                "{} {} {}",
                summary.check_id,
                summary.description,
                summary.element.as_deref().unwrap_or("")
            )) {
                break;
            }
            issues.push(summary);
        }
        CompactReviewResult {
            ok: self.ok,
            session_id: self.session_id.clone(),
            url: self.url.clone(),
            summary: self.summary,
            pillar_grades: self.pillar_grades.clone(),
            issues,
            artifacts: self.artifacts.clone(),
        }
    }
}

/// Strict subset of [`ReviewResult`] for token-constrained consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactReviewResult {
    pub ok: bool,
    pub session_id: String,
    pub url: String,
    pub summary: SummaryCounts,
    pub pillar_grades: BTreeMap<String, PillarGrade>,
    pub issues: Vec<IssueSummary>,
    pub artifacts: ArtifactPaths,
}

/// Result of a successful comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareOutcome {
    pub ok: bool,
    pub session_id: String,
    pub url: String,
    pub reference: String,
    #[serde(flatten)]
    pub result: ComparisonResult,
    pub artifacts: ArtifactPaths,
}

/// Result of `validate-spec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateSpecResult {
    pub ok: bool,
    pub spec: SpecRef,
    pub pillars: usize,
    pub checks: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// The machine error envelope: `{ok:false, errorKind, message, ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResult {
    pub ok: bool,
    #[serde(flatten)]
    pub error: ErrorPayload,
}

impl ErrorResult {
    pub fn from_payload(error: ErrorPayload) -> Self {
        Self { ok: false, error }
    }
}
