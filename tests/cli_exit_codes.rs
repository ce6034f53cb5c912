//! CLI exit codes for spec validation (no browser required).

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn bin_path() -> PathBuf {
    std::env::var("CARGO_BIN_EXE_cvr")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("target")
                .join("debug")
                .join(if cfg!(windows) { "cvr.exe" } else { "cvr" })
        })
}

fn run_validate(spec: &str) -> Output {
    Command::new(bin_path())
        .args(["validate-spec", "--spec", spec, "--format", "json"])
        .output()
        .expect("run cvr")
}

fn write_spec(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write spec");
    path
}

const VALID: &str = r#"---
name: exit-code-spec
version: "1.0"
---

## Accessibility

### Checks

#### color-contrast
- **Severity**: major
- **Config**: minimum_ratio: 4.5
"#;

#[test]
fn valid_spec_exits_zero_with_summary() {
    let dir = TempDir::new().unwrap();
    let path = write_spec(dir.path(), "ok.md", VALID);

    let output = run_validate(path.to_str().unwrap());
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    assert_eq!(value["ok"], true);
    assert_eq!(value["checks"], 1);
    assert_eq!(value["spec"]["name"], "exit-code-spec");
}

#[test]
fn unknown_spec_exits_nonzero_with_error_kind() {
    let output = run_validate("definitely-not-a-spec");
    assert_ne!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    assert_eq!(value["ok"], false);
    assert_eq!(value["errorKind"], "SpecNotFound");
}

#[test]
fn malformed_spec_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let path = write_spec(dir.path(), "broken.md", "# no frontmatter at all\n");

    let output = run_validate(path.to_str().unwrap());
    assert_ne!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    assert_eq!(value["errorKind"], "SpecParseError");
}

#[test]
fn cyclic_spec_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    write_spec(
        dir.path(),
        "x.md",
        "---\nname: x\nextends: y.md\n---\n\n## P\n\n### Checks\n\n#### x-check\n- **Severity**: minor\n",
    );
    let y = write_spec(
        dir.path(),
        "y.md",
        "---\nname: y\nextends: x.md\n---\n\n## P\n\n### Checks\n\n#### y-check\n- **Severity**: minor\n",
    );

    let output = run_validate(y.to_str().unwrap());
    assert_ne!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    assert_eq!(value["errorKind"], "SpecCycle");
}

#[test]
fn dangling_override_is_a_warning_not_a_failure() {
    let dir = TempDir::new().unwrap();
    write_spec(dir.path(), "base.md", VALID);
    let child = write_spec(
        dir.path(),
        "child.md",
        "---\nname: child\nextends: base.md\n---\n\n## Overrides\n\n#### future-check\n- **Severity**: minor\n",
    );

    let output = run_validate(child.to_str().unwrap());
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    assert_eq!(value["ok"], true);
    let warnings = value["warnings"].as_array().expect("warnings array");
    assert_eq!(warnings.len(), 1);
}

#[test]
fn pretty_format_also_respects_exit_codes() {
    let output = Command::new(bin_path())
        .args([
            "validate-spec",
            "--spec",
            "definitely-not-a-spec",
            "--format",
            "pretty",
        ])
        .output()
        .expect("run cvr");
    assert_ne!(output.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SpecNotFound"));
}
