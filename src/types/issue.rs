//! Issues, diagnostics, and pillar grading.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::capture::BoundingBox;

/// Closed severity vocabulary for checks and issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Major,
    Blocking,
}

impl Severity {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "blocking" => Some(Severity::Blocking),
            "major" => Some(Severity::Major),
            "minor" => Some(Severity::Minor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Blocking => "blocking",
            Severity::Major => "major",
            Severity::Minor => "minor",
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        fn rank(s: &Severity) -> u8 {
            match s {
                Severity::Minor => 0,
                Severity::Major => 1,
                Severity::Blocking => 2,
            }
        }
        rank(self).cmp(&rank(other))
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluator output before numbering and selector resolution.
///
/// `severity` is usually `None` (the check's declared severity applies);
/// evaluators that grade per-finding (alt-text) set it explicitly.
#[derive(Debug, Clone, Default)]
pub struct ProtoIssue {
    pub element: Option<usize>,
    pub description: String,
    pub recommendation: Option<String>,
    pub severity: Option<Severity>,
    pub bounding_box: Option<BoundingBox>,
    pub details: BTreeMap<String, Value>,
}

impl ProtoIssue {
    pub fn for_element(handle: usize, bbox: BoundingBox, description: impl Into<String>) -> Self {
        Self {
            element: Some(handle),
            description: description.into(),
            bounding_box: Some(bbox),
            ..Default::default()
        }
    }

    pub fn page_level(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_recommendation(mut self, rec: impl Into<String>) -> Self {
        self.recommendation = Some(rec.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// A resolved finding. Ids are sequential, 1-indexed, per review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: usize,
    pub check_id: String,
    pub pillar: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css_selector: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

/// Non-fatal per-check problems recorded alongside the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub check_id: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// No evaluator registered, or a required input (a11y scan) was missing.
    Skipped,
    /// The evaluator returned an error; the review continued without it.
    EvaluatorError,
    /// Loader warnings (e.g., an override targeting an unknown check).
    SpecWarning,
    /// Annotation was requested but could not be produced.
    AnnotationError,
}

/// Per-check outcome classification used for pillar grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckOutcome {
    Pass,
    Attention,
    Blocking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    F,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::F => "F",
        };
        f.write_str(s)
    }
}

impl Grade {
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            "F" => Some(Grade::F),
            _ => None,
        }
    }

    /// A is better than B is better than C is better than F.
    pub fn is_at_least(&self, other: Grade) -> bool {
        fn rank(g: Grade) -> u8 {
            match g {
                Grade::A => 3,
                Grade::B => 2,
                Grade::C => 1,
                Grade::F => 0,
            }
        }
        rank(*self) >= rank(other)
    }
}

/// Derived letter grade plus outcome counts for one pillar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PillarGrade {
    pub grade: Grade,
    pub passing: usize,
    pub attention: usize,
    pub blocking: usize,
}

impl PillarGrade {
    /// Grade from the issues a pillar's checks produced: any blocking issue
    /// is an F, any major issue a C, otherwise A when every check passed
    /// and B when something minor needs attention.
    pub fn from_outcomes(outcomes: &[(CheckOutcome, Severity)]) -> Self {
        let mut passing = 0;
        let mut attention = 0;
        let mut blocking = 0;
        let mut has_major = false;
        for (outcome, worst) in outcomes {
            match outcome {
                CheckOutcome::Pass => passing += 1,
                CheckOutcome::Attention => {
                    attention += 1;
                    if *worst >= Severity::Major {
                        has_major = true;
                    }
                }
                CheckOutcome::Blocking => blocking += 1,
            }
        }
        let grade = if blocking > 0 {
            Grade::F
        } else if has_major {
            Grade::C
        } else if attention == 0 {
            Grade::A
        } else {
            Grade::B
        };
        Self {
            grade,
            passing,
            attention,
            blocking,
        }
    }
}

/// Issue counts by severity, plus the number of passing checks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCounts {
    pub blocking: usize,
    pub major: usize,
    pub minor: usize,
    pub passing: usize,
}

impl SummaryCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Blocking => self.blocking += 1,
            Severity::Major => self.major += 1,
            Severity::Minor => self.minor += 1,
        }
    }

    pub fn total_issues(&self) -> usize {
        self.blocking + self.major + self.minor
    }
}
