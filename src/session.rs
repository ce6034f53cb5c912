//! Durable session artifact store.
//!
//! Each review or comparison owns a fresh directory under the sessions
//! root, named `review_YYYYMMDDHHMMSS###`. Binary artifacts are discrete
//! files; JSON manifests reference them by path and never embed bytes.
//! A prior session is never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::budget::{truncate_chars, COMPACT_DESCRIPTION_CHARS};
use crate::error::{CvrError, Result};
use crate::types::{Diagnostic, Issue, PillarGrade, SummaryCounts};

pub const SESSION_SCHEMA_VERSION: &str = "1.1";
pub const DEFAULT_SESSIONS_ROOT: &str = ".canvas/reviews";

static SESSION_COUNTER: AtomicU32 = AtomicU32::new(1);

/// File names within a session directory.
pub const SESSION_FILE: &str = "session.json";
pub const REPORT_FILE: &str = "report.json";
pub const SCREENSHOT_FILE: &str = "screenshot.png";
pub const ANNOTATED_FILE: &str = "annotated.png";
pub const DIFF_FILE: &str = "diff.png";
pub const ISSUES_FILE: &str = "issues.md";
pub const TASKS_FILE: &str = "tasks.md";

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

/// An open session directory. Call [`Session::remove`] to discard a
/// partially-written session on fatal failure.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub dir: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a uniquely named session directory. An explicit id is used
    /// verbatim; otherwise ids are UTC-timestamped with a monotonic
    /// counter suffix so concurrent reviews never collide.
    pub fn create_session(&self, explicit_id: Option<&str>) -> Result<Session> {
        fs::create_dir_all(&self.root)
            .map_err(|e| CvrError::artifact_write(self.root.display().to_string(), e.to_string()))?;

        if let Some(id) = explicit_id {
            let dir = self.root.join(id);
            fs::create_dir(&dir).map_err(|e| {
                CvrError::artifact_write(dir.display().to_string(), e.to_string())
            })?;
            return Ok(Session {
                id: id.to_string(),
                dir,
            });
        }

        // Collisions only happen within the same second; bump the counter
        // and retry.
        for _ in 0..1000 {
            let counter = SESSION_COUNTER.fetch_add(1, Ordering::SeqCst) % 1000;
            let id = format!("review_{}{counter:03}", Utc::now().format("%Y%m%d%H%M%S"));
            let dir = self.root.join(&id);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok(Session { id, dir }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(CvrError::artifact_write(
                        dir.display().to_string(),
                        e.to_string(),
                    ))
                }
            }
        }
        Err(CvrError::artifact_write(
            self.root.display().to_string(),
            "could not allocate a unique session id",
        ))
    }
}

impl Session {
    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    pub fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(file);
        let json = serde_json::to_vec_pretty(value)?;
        write_atomic(&path, &json)?;
        Ok(path)
    }

    pub fn write_text(&self, file: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(file);
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }

    /// Remove the whole session directory; used on fatal failure and
    /// cancellation so no partial session survives.
    pub fn remove(&self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(bytes)?;
        file.flush()
    };
    write().map_err(|e| CvrError::artifact_write(path.display().to_string(), e.to_string()))
}

/// Spec identity recorded in manifests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecRef {
    pub name: String,
    pub version: String,
    pub resolved_from: String,
}

/// Artifact references by path. Only ever paths, never bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactPaths {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Issue summary stored in `session.json`; the full record lives in
/// `report.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    pub id: usize,
    pub check_id: String,
    pub severity: crate::types::Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    pub description: String,
}

impl IssueSummary {
    pub fn from_issue(issue: &Issue) -> Self {
        Self {
            id: issue.id,
            check_id: issue.check_id.clone(),
            severity: issue.severity,
            element: issue.css_selector.clone(),
            description: truncate_chars(&issue.description, COMPACT_DESCRIPTION_CHARS),
        }
    }
}

/// `session.json`, schema 1.1. Writers emit only this shape; the legacy
/// 1.0 blob fields (`beforeScreenshot`, inline base64) are never written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionManifest {
    pub schema_version: String,
    pub session_id: String,
    pub url: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<SpecRef>,
    pub summary: SummaryCounts,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pillar_grades: BTreeMap<String, PillarGrade>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<IssueSummary>,
    pub artifacts: ArtifactPaths,
}

/// `report.json`: the full typed report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub schema_version: String,
    pub session_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<SpecRef>,
    pub summary: SummaryCounts,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pillar_grades: BTreeMap<String, PillarGrade>,
    pub issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Human-readable issue list (`issues.md`).
pub fn render_issues_markdown(
    url: &str,
    summary: &SummaryCounts,
    issues: &[Issue],
) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    let _ = writeln!(out, "# Design review issues\n");
    let _ = writeln!(out, "Reviewed: {url}\n");
    let _ = writeln!(
        out,
        "**{} blocking · {} major · {} minor · {} checks passing**\n",
        summary.blocking, summary.major, summary.minor, summary.passing
    );
    for issue in issues {
        let _ = writeln!(
            out,
            "## #{} [{}] {}",
            issue.id, issue.severity, issue.check_id
        );
        let _ = writeln!(out, "\n{}\n", issue.description);
        if let Some(selector) = &issue.css_selector {
            let _ = writeln!(out, "- Selector: `{selector}`");
        }
        if let Some(bbox) = &issue.bounding_box {
            let _ = writeln!(
                out,
                "- Location: ({:.0}, {:.0}) {:.0}x{:.0}",
                bbox.x, bbox.y, bbox.width, bbox.height
            );
        }
        if let Some(rec) = &issue.recommendation {
            let _ = writeln!(out, "- Recommendation: {rec}");
        }
        out.push('\n');
    }
    out
}

/// Human-check task list (`tasks.md`) for spec checks without evaluators.
pub fn render_tasks_markdown(items: &[(String, String, Option<String>)]) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    let _ = writeln!(out, "# Manual review tasks\n");
    if items.is_empty() {
        let _ = writeln!(out, "Every spec check ran automatically; nothing to do.");
        return out;
    }
    for (check_id, description, how) in items {
        let _ = writeln!(out, "- [ ] **{check_id}** — {description}");
        if let Some(how) = how {
            let _ = writeln!(out, "  - How: {how}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use tempfile::TempDir;

    #[test]
    fn session_ids_are_unique_and_timestamp_ordered() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let a = store.create_session(None).unwrap();
        let b = store.create_session(None).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("review_"));
        assert!(b.id.starts_with("review_"));
        assert!(a.dir.exists() && b.dir.exists());
        // Same writer never mixes id formats.
        assert!(!a.id.starts_with("ses-"));
    }

    #[test]
    fn explicit_session_id_is_used_verbatim() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let session = store.create_session(Some("review_custom001")).unwrap();
        assert_eq!(session.id, "review_custom001");
        assert!(dir.path().join("review_custom001").exists());
    }

    #[test]
    fn duplicate_explicit_id_fails() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        store.create_session(Some("review_dup")).unwrap();
        let err = store.create_session(Some("review_dup")).unwrap_err();
        assert_eq!(err.error_kind(), "ArtifactWriteError");
    }

    #[test]
    fn remove_deletes_partial_sessions() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let session = store.create_session(None).unwrap();
        session.write_text("screenshot.png", "stub").unwrap();
        session.remove();
        assert!(!session.dir.exists());
    }

    #[test]
    fn manifest_serializes_schema_1_1_without_blobs() {
        let manifest = SessionManifest {
            schema_version: SESSION_SCHEMA_VERSION.into(),
            session_id: "review_20260115120000001".into(),
            url: "https://example.test/".into(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            spec: Some(SpecRef {
                name: "web-baseline".into(),
                version: "1.0".into(),
                resolved_from: "specs/web-baseline.md".into(),
            }),
            summary: SummaryCounts {
                blocking: 0,
                major: 1,
                minor: 0,
                passing: 4,
            },
            pillar_grades: BTreeMap::new(),
            issues: vec![IssueSummary {
                id: 1,
                check_id: "color-contrast".into(),
                severity: Severity::Major,
                element: Some("p".into()),
                description: "Text contrast 1.6:1 is below the required 4.5:1".into(),
            }],
            artifacts: ArtifactPaths {
                screenshot: Some(".canvas/reviews/review_x/screenshot.png".into()),
                ..Default::default()
            },
        };
        let json = serde_json::to_string_pretty(&manifest).unwrap();
        assert!(json.contains("\"schemaVersion\": \"1.1\""));
        assert!(!json.contains("beforeScreenshot"));
        assert!(!json.contains("base64"));
        // No-blob invariant: nothing in the manifest approaches binary size.
        for line in json.lines() {
            assert!(line.len() < 1024, "suspiciously long manifest line");
        }
    }

    #[test]
    fn issue_summary_truncates_description() {
        let issue = Issue {
            id: 1,
            check_id: "color-contrast".into(),
            pillar: "Accessibility".into(),
            severity: Severity::Minor,
            element: None,
            css_selector: None,
            description: "d".repeat(500),
            recommendation: None,
            bounding_box: None,
            details: BTreeMap::new(),
        };
        let summary = IssueSummary::from_issue(&issue);
        assert!(summary.description.chars().count() <= COMPACT_DESCRIPTION_CHARS);
    }

    #[test]
    fn issues_markdown_lists_every_issue() {
        let issues: Vec<Issue> = (1..=3)
            .map(|id| Issue {
                id,
                check_id: "touch-targets".into(),
                pillar: "Usability".into(),
                severity: Severity::Major,
                element: Some(0),
                css_selector: Some("button.cta".into()),
                description: format!("Issue number {id}"),
                recommendation: None,
                bounding_box: None,
                details: BTreeMap::new(),
            })
            .collect();
        let md = render_issues_markdown(
            "https://example.test/",
            &SummaryCounts {
                blocking: 0,
                major: 3,
                minor: 0,
                passing: 1,
            },
            &issues,
        );
        for id in 1..=3 {
            assert!(md.contains(&format!("## #{id}")));
        }
        assert!(md.contains("button.cta"));
    }

    #[test]
    fn tasks_markdown_handles_empty_and_populated() {
        let empty = render_tasks_markdown(&[]);
        assert!(empty.contains("nothing to do"));

        let tasks = vec![(
            "brand-colors".to_string(),
            "Only approved colors".to_string(),
            Some("Eyeball the hero section".to_string()),
        )];
        let md = render_tasks_markdown(&tasks);
        assert!(md.contains("- [ ] **brand-colors**"));
        assert!(md.contains("Eyeball"));
    }
}
