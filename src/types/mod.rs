//! Core data types shared across the review engine.

mod capture;
mod issue;

pub use capture::{
    A11yImpact, A11yNode, A11yReport, A11yViolation, AncestorInfo, BoundingBox, ComputedStyles,
    DomNode, ElementInfo, FocusStyles, PageCapture,
};
pub use issue::{
    CheckOutcome, Diagnostic, DiagnosticKind, Grade, Issue, PillarGrade, ProtoIssue, Severity,
    SummaryCounts,
};
