//! CLI output rendering: JSON for machines, a colored summary for humans.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cvr_lib::output::{CompareOutcome, ErrorResult, ReviewResult, ValidateSpecResult};
use cvr_lib::{CvrError, Severity};
use serde::Serialize;

use crate::cli::OutputFormat;

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const ORANGE: &str = "\x1b[38;5;208m";
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

pub fn write_json<T: Serialize>(body: &T, output: Option<&Path>) -> std::io::Result<()> {
    let content = serde_json::to_string_pretty(body)
        .unwrap_or_else(|_| "{\"ok\":false,\"errorKind\":\"SerializationError\"}".into());
    match output {
        Some(path) => std::fs::write(path, content),
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

/// Render an error in the requested format and return the failure exit code.
pub fn render_error(err: CvrError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    let envelope = ErrorResult::from_payload(err.to_payload());
    match format {
        OutputFormat::Json => {
            if write_json(&envelope, output.as_deref()).is_err() {
                eprintln!("{}", err);
            }
        }
        OutputFormat::Pretty => {
            let (red, reset) = colors();
            eprintln!("{red}error[{}]{reset}: {}", envelope.error.error_kind, envelope.error.message);
            if let Some(remediation) = &envelope.error.remediation {
                eprintln!("  hint: {remediation}");
            }
        }
    }
    ExitCode::FAILURE
}

pub fn print_review_pretty(result: &ReviewResult) {
    let tty = std::io::stdout().is_terminal();
    let paint = |color: &str, text: &str| {
        if tty {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    };

    println!("Review of {}", result.url);
    println!(
        "  {} blocking · {} major · {} minor · {} checks passing",
        paint(RED, &result.summary.blocking.to_string()),
        paint(ORANGE, &result.summary.major.to_string()),
        paint(YELLOW, &result.summary.minor.to_string()),
        paint(GREEN, &result.summary.passing.to_string()),
    );
    for (pillar, grade) in &result.pillar_grades {
        println!("  {pillar}: {}", grade.grade);
    }
    for issue in &result.issues {
        let color = match issue.severity {
            Severity::Blocking => RED,
            Severity::Major => ORANGE,
            Severity::Minor => YELLOW,
        };
        let selector = issue.css_selector.as_deref().unwrap_or("(page)");
        println!(
            "  {} #{}: {} {}",
            paint(color, issue.severity.as_str()),
            issue.id,
            issue.description,
            paint(DIM, &format!("\u{2192} {selector}")),
        );
    }
    if let Some(screenshot) = &result.artifacts.screenshot {
        println!("  artifacts: {}", parent_dir(screenshot));
    }
}

pub fn print_compare_pretty(outcome: &CompareOutcome) {
    let verdict = if outcome.result.is_match {
        "MATCH"
    } else {
        "MISMATCH"
    };
    println!("Comparison of {} vs {}", outcome.url, outcome.reference);
    println!(
        "  {verdict}: {:.2}% pixels changed (≤ {:.2}%), SSIM {:.4} (≥ {:.2})",
        outcome.result.pixel_diff_percent,
        outcome.result.pixel_threshold,
        outcome.result.ssim_score,
        outcome.result.ssim_threshold,
    );
    if outcome.result.size_mismatch {
        println!("  note: dimensions differed; current was resized to the reference");
    }
    for region in &outcome.result.diff_regions {
        println!(
            "  {:?} region at ({}, {}) {}x{} ({} px)",
            region.severity, region.x, region.y, region.width, region.height, region.pixel_count
        );
    }
    if let Some(diff) = &outcome.artifacts.diff {
        println!("  diff: {diff}");
    }
}

pub fn print_validate_pretty(result: &ValidateSpecResult) {
    println!(
        "Spec '{}' v{} resolves: {} pillars, {} checks",
        result.spec.name, result.spec.version, result.pillars, result.checks
    );
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
}

fn colors() -> (&'static str, &'static str) {
    if std::io::stderr().is_terminal() {
        (RED, RESET)
    } else {
        ("", "")
    }
}

fn parent_dir(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| path.to_string())
}
