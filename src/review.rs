//! Review orchestration: capture once, evaluate checks against the
//! snapshot, number and resolve issues, grade pillars, persist the session.

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::annotate::annotate_screenshot;
use crate::browser::{validate_url, BrowserManager, BrowserOptions};
use crate::checks::CheckRegistry;
use crate::compare::{compare_images, load_reference, render_diff, CompareParams, DiffStyle};
use crate::error::Result;
use crate::events::{EventBus, ReviewEvent};
use crate::output::{CompareOutcome, ReviewResult, ValidateSpecResult};
use crate::selector;
use crate::session::{
    render_issues_markdown, render_tasks_markdown, ArtifactPaths, IssueSummary, Session,
    SessionManifest, SessionReport, SessionStore, SpecRef, ANNOTATED_FILE, DIFF_FILE, ISSUES_FILE,
    REPORT_FILE, SCREENSHOT_FILE, SESSION_FILE, SESSION_SCHEMA_VERSION, TASKS_FILE,
};
use crate::spec::{Spec, SpecLoader};
use crate::types::{
    CheckOutcome, Diagnostic, DiagnosticKind, Issue, PageCapture, PillarGrade, ProtoIssue,
    Severity, SummaryCounts,
};

pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct ReviewOptions {
    /// Narrow the review to a CSS selector subtree.
    pub scope: Option<String>,
    pub annotate: bool,
    pub compact: bool,
    pub generate_tasks: bool,
    pub generate_markdown: bool,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompareOptions {
    pub params: CompareParams,
    pub diff_style: DiffStyle,
    /// Capture only the viewport instead of the full page.
    pub viewport_only: bool,
    pub session_id: Option<String>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            params: CompareParams::default(),
            diff_style: DiffStyle::Overlay,
            viewport_only: false,
            session_id: None,
        }
    }
}

pub struct EngineOptions {
    pub browser: BrowserOptions,
    pub sessions_root: PathBuf,
    pub spec_roots: Vec<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            browser: BrowserOptions::default(),
            sessions_root: PathBuf::from(crate::session::DEFAULT_SESSIONS_ROOT),
            spec_roots: vec![PathBuf::from("specs"), PathBuf::from(".canvas/specs")],
        }
    }
}

pub struct ReviewEngine {
    loader: SpecLoader,
    registry: CheckRegistry,
    browser: BrowserManager,
    store: SessionStore,
    bus: EventBus,
    progress: Option<ProgressCallback>,
}

/// Removes the session directory unless the pipeline reached the point
/// where `session.json` was durably written. Covers both fatal errors and
/// cancellation (the future being dropped).
struct SessionGuard {
    session: Session,
    committed: bool,
}

impl SessionGuard {
    fn new(session: Session) -> Self {
        Self {
            session,
            committed: false,
        }
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.committed {
            self.session.remove();
        }
    }
}

impl ReviewEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            loader: SpecLoader::new(options.spec_roots),
            registry: CheckRegistry::with_builtins(),
            browser: BrowserManager::new(options.browser),
            store: SessionStore::new(options.sessions_root),
            bus: EventBus::new(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Register additional evaluators before running reviews.
    pub fn registry_mut(&mut self) -> &mut CheckRegistry {
        &mut self.registry
    }

    /// Event bus for external overlay subscribers.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Load and resolve a spec without running anything.
    pub fn validate_spec(&self, spec_id: &str) -> Result<ValidateSpecResult> {
        let loaded = self.loader.load(spec_id)?;
        Ok(ValidateSpecResult {
            ok: true,
            spec: spec_ref(&loaded.spec),
            pillars: loaded.spec.pillars.len(),
            checks: loaded.spec.check_count(),
            warnings: loaded.warnings.clone(),
        })
    }

    /// Run the full review pipeline for one URL.
    pub async fn review(
        &self,
        url: &str,
        spec_id: &str,
        options: &ReviewOptions,
    ) -> Result<ReviewResult> {
        let start_time = Utc::now();
        self.log(&format!("Loading spec '{spec_id}'…"));
        let loaded = self.loader.load(spec_id)?;
        let spec = &loaded.spec;
        let url = validate_url(url)?;

        let session = self.store.create_session(options.session_id.as_deref())?;
        let mut guard = SessionGuard::new(session);
        let session_id = guard.session.id.clone();
        let screenshot_path = guard.session.path(SCREENSHOT_FILE);

        self.log(&format!(
            "Capturing {url} ({})…",
            self.browser.viewport()
        ));
        self.bus.emit(&ReviewEvent::CaptureModeChanged { enabled: true });
        let capture_result = self
            .browser
            .capture_page(&url, &screenshot_path, options.scope.as_deref())
            .await;
        self.bus.emit(&ReviewEvent::CaptureModeChanged { enabled: false });
        // Navigation failure: the guard tears the session down, nothing is
        // left on disk.
        let capture = capture_result?;

        self.bus.emit(&ReviewEvent::Started {
            url: url.clone(),
            session_id: session_id.clone(),
            spec: spec.name.clone(),
        });

        let mut diagnostics: Vec<Diagnostic> = loaded
            .warnings
            .iter()
            .map(|w| Diagnostic {
                check_id: String::new(),
                kind: DiagnosticKind::SpecWarning,
                message: w.clone(),
            })
            .collect();

        self.log(&format!(
            "Running {} checks across {} pillars…",
            spec.check_count(),
            spec.pillars.len()
        ));
        let evaluation = self.run_checks(spec, &capture, &mut diagnostics);

        let mut summary = SummaryCounts::default();
        for issue in &evaluation.issues {
            summary.add(issue.severity);
        }
        summary.passing = evaluation.passing_checks;

        for issue in &evaluation.issues {
            self.bus.emit(&ReviewEvent::IssueFound(issue.clone()));
        }

        let mut artifacts = ArtifactPaths {
            screenshot: Some(path_string(&screenshot_path)),
            ..Default::default()
        };

        if options.annotate {
            self.log("Rendering annotated screenshot…");
            let annotated_path = guard.session.path(ANNOTATED_FILE);
            match annotate_screenshot(&screenshot_path, &evaluation.issues, &annotated_path) {
                Ok(_) => artifacts.annotated = Some(path_string(&annotated_path)),
                Err(err) => diagnostics.push(Diagnostic {
                    check_id: String::new(),
                    kind: DiagnosticKind::AnnotationError,
                    message: err.to_string(),
                }),
            }
        }

        let report = SessionReport {
            schema_version: SESSION_SCHEMA_VERSION.into(),
            session_id: session_id.clone(),
            url: url.clone(),
            spec: Some(spec_ref(spec)),
            summary,
            pillar_grades: evaluation.pillar_grades.clone(),
            issues: evaluation.issues.clone(),
            diagnostics: diagnostics.clone(),
        };
        let report_path = guard.session.write_json(REPORT_FILE, &report)?;
        artifacts.report = Some(path_string(&report_path));

        if options.generate_markdown {
            let md = render_issues_markdown(&url, &summary, &evaluation.issues);
            let path = guard.session.write_text(ISSUES_FILE, &md)?;
            artifacts.markdown = Some(path_string(&path));
        }
        if options.generate_tasks {
            let md = render_tasks_markdown(&evaluation.human_checks);
            let path = guard.session.write_text(TASKS_FILE, &md)?;
            artifacts.tasks = Some(path_string(&path));
        }

        let end_time = Utc::now();
        let manifest = SessionManifest {
            schema_version: SESSION_SCHEMA_VERSION.into(),
            session_id: session_id.clone(),
            url: url.clone(),
            start_time,
            end_time,
            spec: Some(spec_ref(spec)),
            summary,
            pillar_grades: evaluation.pillar_grades.clone(),
            issues: evaluation.issues.iter().map(IssueSummary::from_issue).collect(),
            artifacts: artifacts.clone(),
        };
        guard.session.write_json(SESSION_FILE, &manifest)?;
        guard.commit();

        self.bus.emit(&ReviewEvent::Completed {
            session_id: session_id.clone(),
            summary,
            pillar_grades: evaluation.pillar_grades.clone(),
        });
        self.log(&format!(
            "Review complete: {} blocking, {} major, {} minor ({})",
            summary.blocking, summary.major, summary.minor, session_id
        ));

        Ok(ReviewResult {
            ok: true,
            session_id,
            url,
            spec: spec_ref(spec),
            start_time,
            end_time,
            summary,
            pillar_grades: evaluation.pillar_grades,
            issues: evaluation.issues,
            diagnostics,
            artifacts,
        })
    }

    /// Compare a live page against a reference image.
    pub async fn compare(
        &self,
        url: &str,
        reference_path: &std::path::Path,
        options: &CompareOptions,
    ) -> Result<CompareOutcome> {
        let url = validate_url(url)?;
        // Resolve the reference before any session exists on disk.
        let reference = load_reference(reference_path)?;

        let session = self.store.create_session(options.session_id.as_deref())?;
        let mut guard = SessionGuard::new(session);
        let session_id = guard.session.id.clone();
        let screenshot_path = guard.session.path(SCREENSHOT_FILE);

        self.log(&format!("Capturing {url} for comparison…"));
        self.bus.emit(&ReviewEvent::CaptureModeChanged { enabled: true });
        let shot = self
            .browser
            .capture_screenshot(&url, &screenshot_path, !options.viewport_only)
            .await;
        self.bus.emit(&ReviewEvent::CaptureModeChanged { enabled: false });
        shot?;

        let current = image::open(&screenshot_path)?;
        self.log("Comparing against reference…");
        let (result, data) = compare_images(&reference, &current, &options.params);

        let diff_path = guard.session.path(DIFF_FILE);
        render_diff(
            &reference,
            &data,
            &result.diff_regions,
            options.diff_style,
            &diff_path,
        )?;

        let artifacts = ArtifactPaths {
            screenshot: Some(path_string(&screenshot_path)),
            diff: Some(path_string(&diff_path)),
            ..Default::default()
        };

        let outcome = CompareOutcome {
            ok: true,
            session_id: session_id.clone(),
            url: url.clone(),
            reference: reference_path.display().to_string(),
            result,
            artifacts: artifacts.clone(),
        };
        guard.session.write_json(REPORT_FILE, &outcome)?;

        let now = Utc::now();
        let manifest = SessionManifest {
            schema_version: SESSION_SCHEMA_VERSION.into(),
            session_id: session_id.clone(),
            url,
            start_time: now,
            end_time: now,
            spec: None,
            summary: SummaryCounts::default(),
            pillar_grades: BTreeMap::new(),
            issues: vec![],
            artifacts,
        };
        guard.session.write_json(SESSION_FILE, &manifest)?;
        guard.commit();

        self.log(&format!(
            "Comparison {}: {:.2}% pixels changed, SSIM {:.4} ({session_id})",
            if outcome.result.is_match { "passed" } else { "failed" },
            outcome.result.pixel_diff_percent,
            outcome.result.ssim_score
        ));
        Ok(outcome)
    }

    fn run_checks(
        &self,
        spec: &Spec,
        capture: &PageCapture,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Evaluation {
        let mut issues: Vec<Issue> = Vec::new();
        let mut human_checks: Vec<(String, String, Option<String>)> = Vec::new();
        let mut pillar_grades = BTreeMap::new();
        let mut passing_checks = 0usize;
        let mut next_id = 1usize;

        for pillar in &spec.pillars {
            let mut outcomes: Vec<(CheckOutcome, Severity)> = Vec::new();

            for check in &pillar.checks {
                let Some(evaluator) = self.registry.get(&check.id) else {
                    diagnostics.push(Diagnostic {
                        check_id: check.id.clone(),
                        kind: DiagnosticKind::Skipped,
                        message: "no evaluator registered; review manually".into(),
                    });
                    human_checks.push((
                        check.id.clone(),
                        check.description.clone(),
                        check.how_to_check.clone(),
                    ));
                    continue;
                };

                if evaluator.needs_a11y() && capture.a11y.is_none() {
                    diagnostics.push(Diagnostic {
                        check_id: check.id.clone(),
                        kind: DiagnosticKind::Skipped,
                        message: "accessibility scan unavailable for this capture".into(),
                    });
                    continue;
                }

                match evaluator.evaluate(capture, &check.config) {
                    Ok(protos) if protos.is_empty() => {
                        passing_checks += 1;
                        outcomes.push((CheckOutcome::Pass, check.severity));
                    }
                    Ok(protos) => {
                        let mut worst = Severity::Minor;
                        let mut blocking = false;
                        for proto in protos {
                            let issue =
                                resolve_issue(next_id, check, &pillar.name, proto, capture);
                            next_id += 1;
                            worst = worst.max(issue.severity);
                            blocking |= issue.severity == Severity::Blocking;
                            issues.push(issue);
                        }
                        let outcome = if blocking {
                            CheckOutcome::Blocking
                        } else {
                            CheckOutcome::Attention
                        };
                        outcomes.push((outcome, worst));
                    }
                    Err(err) => {
                        diagnostics.push(Diagnostic {
                            check_id: check.id.clone(),
                            kind: DiagnosticKind::EvaluatorError,
                            message: err.to_string(),
                        });
                    }
                }
            }

            if !outcomes.is_empty() {
                pillar_grades.insert(pillar.name.clone(), PillarGrade::from_outcomes(&outcomes));
            }
        }

        Evaluation {
            issues,
            pillar_grades,
            human_checks,
            passing_checks,
        }
    }

    fn log(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress(message);
        }
    }
}

struct Evaluation {
    issues: Vec<Issue>,
    pillar_grades: BTreeMap<String, PillarGrade>,
    human_checks: Vec<(String, String, Option<String>)>,
    passing_checks: usize,
}

/// Attach id, severity, selector, and bounding box to a proto-issue.
fn resolve_issue(
    id: usize,
    check: &crate::spec::Check,
    pillar: &str,
    proto: ProtoIssue,
    capture: &PageCapture,
) -> Issue {
    let severity = proto.severity.unwrap_or(check.severity);
    let css_selector = proto
        .element
        .and_then(|handle| capture.element(handle))
        .map(selector::synthesize);
    let bounding_box = proto.bounding_box.or_else(|| {
        proto
            .element
            .and_then(|handle| capture.element(handle))
            .map(|el| el.bounding_box)
    });

    Issue {
        id,
        check_id: check.id.clone(),
        pillar: pillar.to_string(),
        severity,
        element: proto.element,
        css_selector,
        description: proto.description,
        recommendation: proto.recommendation,
        bounding_box,
        details: proto.details,
    }
}

fn spec_ref(spec: &Spec) -> SpecRef {
    SpecRef {
        name: spec.name.clone(),
        version: spec.version.clone(),
        resolved_from: spec.resolved_from.clone(),
    }
}

fn path_string(path: &std::path::Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Check, CheckConfig, ConfigValue, Pillar};
    use crate::types::{BoundingBox, ComputedStyles, ElementInfo};
    use crate::viewport::Viewport;
    use chrono::TimeZone;

    fn engine() -> ReviewEngine {
        ReviewEngine::new(EngineOptions::default())
    }

    fn capture_with(elements: Vec<ElementInfo>) -> PageCapture {
        PageCapture {
            url: "https://example.test/".into(),
            viewport: Viewport::default(),
            timestamp: chrono::Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
            screenshot_path: "screenshot.png".into(),
            dom: None,
            a11y: None,
            elements,
        }
    }

    fn contrast_check(severity: Severity) -> Check {
        let mut config = CheckConfig::new();
        config.insert("minimum_ratio".into(), ConfigValue::Number(4.5));
        Check {
            id: "color-contrast".into(),
            severity,
            description: "Contrast".into(),
            config,
            how_to_check: None,
            approved_values: vec![],
        }
    }

    fn touch_check() -> Check {
        Check {
            id: "touch-targets".into(),
            severity: Severity::Major,
            description: "Touch targets".into(),
            config: CheckConfig::new(),
            how_to_check: None,
            approved_values: vec![],
        }
    }

    fn low_contrast_paragraph() -> ElementInfo {
        ElementInfo {
            tag: "p".into(),
            styles: ComputedStyles {
                color: Some("#cccccc".into()),
                background_color: Some("#ffffff".into()),
                ..Default::default()
            },
            bounding_box: BoundingBox {
                x: 8.0,
                y: 8.0,
                width: 200.0,
                height: 24.0,
            },
            text: Some("hi".into()),
            ..Default::default()
        }
    }

    fn tiny_button() -> ElementInfo {
        ElementInfo {
            tag: "button".into(),
            bounding_box: BoundingBox {
                x: 8.0,
                y: 60.0,
                width: 24.0,
                height: 24.0,
            },
            text: Some("x".into()),
            ..Default::default()
        }
    }

    fn spec_with(checks_by_pillar: Vec<(&str, Vec<Check>)>) -> Spec {
        Spec {
            name: "test-spec".into(),
            version: "1.0".into(),
            description: String::new(),
            resolved_from: "test.md".into(),
            pillars: checks_by_pillar
                .into_iter()
                .map(|(name, checks)| Pillar {
                    name: name.into(),
                    description: String::new(),
                    checks,
                })
                .collect(),
        }
    }

    #[test]
    fn issues_are_numbered_in_spec_then_emission_order() {
        let eng = engine();
        let spec = spec_with(vec![
            ("Accessibility", vec![contrast_check(Severity::Major)]),
            ("Usability", vec![touch_check()]),
        ]);
        let capture = capture_with(vec![low_contrast_paragraph(), tiny_button()]);
        let mut diagnostics = Vec::new();
        let evaluation = eng.run_checks(&spec, &capture, &mut diagnostics);

        assert_eq!(evaluation.issues.len(), 2);
        assert_eq!(evaluation.issues[0].id, 1);
        assert_eq!(evaluation.issues[0].check_id, "color-contrast");
        assert_eq!(evaluation.issues[1].id, 2);
        assert_eq!(evaluation.issues[1].check_id, "touch-targets");
        // Ids form a 1-indexed prefix of the naturals.
        for (idx, issue) in evaluation.issues.iter().enumerate() {
            assert_eq!(issue.id, idx + 1);
        }
    }

    #[test]
    fn issue_selectors_are_resolved_and_nonempty() {
        let eng = engine();
        let spec = spec_with(vec![(
            "Accessibility",
            vec![contrast_check(Severity::Major)],
        )]);
        let capture = capture_with(vec![low_contrast_paragraph()]);
        let mut diagnostics = Vec::new();
        let evaluation = eng.run_checks(&spec, &capture, &mut diagnostics);

        let issue = &evaluation.issues[0];
        assert_eq!(issue.css_selector.as_deref(), Some("p"));
        assert_eq!(issue.severity, Severity::Major);
        assert!(issue.bounding_box.is_some());
        assert!(issue.description.contains("1.6"));
    }

    #[test]
    fn unknown_check_becomes_skipped_diagnostic_and_task() {
        let eng = engine();
        let spec = spec_with(vec![(
            "Craft",
            vec![Check {
                id: "brand-colors".into(),
                severity: Severity::Minor,
                description: "Approved colors only".into(),
                config: CheckConfig::new(),
                how_to_check: Some("Look at the hero".into()),
                approved_values: vec!["#fff".into()],
            }],
        )]);
        let capture = capture_with(vec![]);
        let mut diagnostics = Vec::new();
        let evaluation = eng.run_checks(&spec, &capture, &mut diagnostics);

        assert!(evaluation.issues.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Skipped);
        assert_eq!(evaluation.human_checks.len(), 1);
        assert_eq!(evaluation.human_checks[0].0, "brand-colors");
    }

    #[test]
    fn a11y_check_skips_without_scan() {
        let eng = engine();
        let spec = spec_with(vec![(
            "Accessibility",
            vec![Check {
                id: "accessibility-grade".into(),
                severity: Severity::Major,
                description: "Grade".into(),
                config: CheckConfig::new(),
                how_to_check: None,
                approved_values: vec![],
            }],
        )]);
        let capture = capture_with(vec![]);
        let mut diagnostics = Vec::new();
        let evaluation = eng.run_checks(&spec, &capture, &mut diagnostics);

        assert!(evaluation.issues.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Skipped);
        assert_eq!(diagnostics[0].check_id, "accessibility-grade");
    }

    #[test]
    fn pillar_grades_reflect_issue_severities() {
        let eng = engine();
        let spec = spec_with(vec![
            ("Accessibility", vec![contrast_check(Severity::Major)]),
            ("Usability", vec![touch_check()]),
        ]);
        // Only the contrast check fails.
        let capture = capture_with(vec![
            low_contrast_paragraph(),
            ElementInfo {
                tag: "button".into(),
                bounding_box: BoundingBox {
                    x: 8.0,
                    y: 60.0,
                    width: 48.0,
                    height: 48.0,
                },
                text: Some("ok".into()),
                ..Default::default()
            },
        ]);
        let mut diagnostics = Vec::new();
        let evaluation = eng.run_checks(&spec, &capture, &mut diagnostics);

        assert_eq!(
            evaluation.pillar_grades["Accessibility"].grade,
            crate::types::Grade::C
        );
        assert_eq!(
            evaluation.pillar_grades["Usability"].grade,
            crate::types::Grade::A
        );
        assert_eq!(evaluation.passing_checks, 1);
    }

    #[test]
    fn blocking_severity_override_fails_pillar() {
        let eng = engine();
        let spec = spec_with(vec![(
            "Accessibility",
            vec![contrast_check(Severity::Blocking)],
        )]);
        let capture = capture_with(vec![low_contrast_paragraph()]);
        let mut diagnostics = Vec::new();
        let evaluation = eng.run_checks(&spec, &capture, &mut diagnostics);

        assert_eq!(evaluation.issues[0].severity, Severity::Blocking);
        assert_eq!(
            evaluation.pillar_grades["Accessibility"].grade,
            crate::types::Grade::F
        );
    }

    #[test]
    fn severity_vocabulary_is_closed() {
        let eng = engine();
        let spec = spec_with(vec![
            ("Accessibility", vec![contrast_check(Severity::Major)]),
            ("Usability", vec![touch_check()]),
        ]);
        let capture = capture_with(vec![low_contrast_paragraph(), tiny_button()]);
        let mut diagnostics = Vec::new();
        let evaluation = eng.run_checks(&spec, &capture, &mut diagnostics);
        for issue in &evaluation.issues {
            assert!(matches!(
                issue.severity,
                Severity::Blocking | Severity::Major | Severity::Minor
            ));
        }
    }
}
