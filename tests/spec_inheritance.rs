//! Spec loader integration: inheritance, overrides, and round-tripping.

use std::fs;
use std::path::{Path, PathBuf};

use cvr_lib::{Severity, SpecLoader};
use tempfile::TempDir;

fn write_spec(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write spec");
    path
}

const PARENT: &str = r#"---
name: parent
version: "1.0"
---

Baseline spec.

## Accessibility

### Checks

#### color-contrast
- **Severity**: major
- **Description**: Text must meet WCAG AA contrast.
- **Config**: minimum_ratio: 4.5

#### accessibility-grade
- **Severity**: major
- **Description**: Aggregate accessibility grade.
- **Config**: minimum_grade: C

## Quality Craft

### Checks

#### touch-targets
- **Severity**: minor
- **Description**: Interactive targets are comfortably sized.
- **Config**: minimum_size: 44
"#;

#[test]
fn child_override_changes_config_but_keeps_severity() {
    // A child spec raises minimum_grade from C to B; the check's identity
    // and inherited severity are untouched.
    let dir = TempDir::new().unwrap();
    write_spec(dir.path(), "parent.md", PARENT);
    let child_path = write_spec(
        dir.path(),
        "child.md",
        r#"---
name: child
version: "1.1"
extends: parent.md
---

## Overrides

#### accessibility-grade
- **Config**: minimum_grade: B
"#,
    );

    let loader = SpecLoader::new(vec![dir.path().to_path_buf()]);
    let loaded = loader.load(child_path.to_str().unwrap()).unwrap();

    let grade_checks: Vec<_> = loaded
        .spec
        .checks()
        .filter(|(_, c)| c.id == "accessibility-grade")
        .collect();
    assert_eq!(grade_checks.len(), 1, "no duplicated check after merge");

    let check = grade_checks[0].1;
    assert_eq!(check.severity, Severity::Major);
    assert_eq!(
        check.config.get("minimum_grade").and_then(|v| v.as_str()),
        Some("B")
    );
    assert!(loaded.warnings.is_empty());
}

#[test]
fn override_keeps_check_id_and_reports_dangling_targets() {
    let dir = TempDir::new().unwrap();
    write_spec(dir.path(), "parent.md", PARENT);
    let child_path = write_spec(
        dir.path(),
        "child.md",
        r#"---
name: child
extends: parent.md
---

## Overrides

#### color-contrast
- **Severity**: blocking

#### not-a-real-check
- **Severity**: minor
"#,
    );

    let loader = SpecLoader::new(vec![dir.path().to_path_buf()]);
    let loaded = loader.load(child_path.to_str().unwrap()).unwrap();

    let check = loaded.spec.find_check("color-contrast").unwrap();
    assert_eq!(check.id, "color-contrast");
    assert_eq!(check.severity, Severity::Blocking);

    assert_eq!(loaded.warnings.len(), 1);
    assert!(loaded.warnings[0].contains("not-a-real-check"));
}

#[test]
fn extends_cycles_are_rejected() {
    let dir = TempDir::new().unwrap();
    write_spec(
        dir.path(),
        "a.md",
        "---\nname: a\nextends: b.md\n---\n\n## P\n\n### Checks\n\n#### a-check\n- **Severity**: minor\n",
    );
    write_spec(
        dir.path(),
        "b.md",
        "---\nname: b\nextends: a.md\n---\n\n## P\n\n### Checks\n\n#### b-check\n- **Severity**: minor\n",
    );

    let loader = SpecLoader::new(vec![dir.path().to_path_buf()]);
    let err = loader
        .load(dir.path().join("a.md").to_str().unwrap())
        .unwrap_err();
    assert_eq!(err.error_kind(), "SpecCycle");
}

#[test]
fn self_extends_is_a_cycle() {
    let dir = TempDir::new().unwrap();
    let path = write_spec(
        dir.path(),
        "selfish.md",
        "---\nname: selfish\nextends: selfish.md\n---\n\n## P\n\n### Checks\n\n#### a-check\n- **Severity**: minor\n",
    );
    let loader = SpecLoader::new(vec![dir.path().to_path_buf()]);
    let err = loader.load(path.to_str().unwrap()).unwrap_err();
    assert_eq!(err.error_kind(), "SpecCycle");
}

#[test]
fn load_dump_reload_yields_equal_structures() {
    let dir = TempDir::new().unwrap();
    let path = write_spec(dir.path(), "parent.md", PARENT);
    let loader = SpecLoader::new(vec![dir.path().to_path_buf()]);
    let first = loader.load(path.to_str().unwrap()).unwrap();

    let dumped = first.spec.to_canonical_markdown();
    let second_path = write_spec(dir.path(), "roundtrip.md", &dumped);
    let second = loader.load(second_path.to_str().unwrap()).unwrap();

    assert_eq!(first.spec.name, second.spec.name);
    assert_eq!(first.spec.version, second.spec.version);
    assert_eq!(first.spec.pillars, second.spec.pillars);
}

#[test]
fn invalid_severity_fails_at_load_time() {
    let dir = TempDir::new().unwrap();
    let path = write_spec(
        dir.path(),
        "bad.md",
        "---\nname: bad\n---\n\n## P\n\n### Checks\n\n#### some-check\n- **Severity**: catastrophic\n",
    );
    let loader = SpecLoader::new(vec![dir.path().to_path_buf()]);
    let err = loader.load(path.to_str().unwrap()).unwrap_err();
    assert_eq!(err.error_kind(), "SpecInvalidSeverity");
}

#[test]
fn skill_frontmatter_shape_loads() {
    let dir = TempDir::new().unwrap();
    let path = write_spec(
        dir.path(),
        "skill.md",
        "---\nname: quick-look\ndescription: Skill-style spec\n---\n\n## P\n\n### Checks\n\n#### alt-text\n- **Severity**: blocking\n",
    );
    let loader = SpecLoader::new(vec![dir.path().to_path_buf()]);
    let loaded = loader.load(path.to_str().unwrap()).unwrap();
    assert_eq!(loaded.spec.version, "1.0");
    assert_eq!(loaded.spec.description, "Skill-style spec");
    assert_eq!(loaded.spec.check_count(), 1);
}
