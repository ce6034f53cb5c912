//! Markdown spec parsing.
//!
//! A spec file is YAML frontmatter between `---` markers followed by a
//! markdown body: `## <Pillar>` sections, each with a `### Checks` header
//! introducing `#### <check-id>` items whose metadata is definition-list
//! bullets. A `## Overrides` section declares partial updates by check id.

use serde::Deserialize;

use crate::error::{CvrError, Result};
use crate::spec::model::{Check, CheckConfig, ConfigValue, OverrideEntry, Pillar, SpecDocument};
use crate::types::Severity;

/// Frontmatter covers both the spec shape `{name, version, extends}` and
/// the skill shape `{name, description}`.
#[derive(Debug, Deserialize)]
struct Frontmatter {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    extends: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

pub fn parse_spec_markdown(content: &str, path: &str) -> Result<SpecDocument> {
    let (frontmatter_str, body) = extract_frontmatter(content, path)?;

    let frontmatter: Frontmatter = serde_yaml::from_str(&frontmatter_str)
        .map_err(|e| CvrError::spec_parse(path, format!("invalid frontmatter: {e}")))?;

    let (pillars, overrides, body_description) = parse_body(&body, path)?;

    Ok(SpecDocument {
        name: frontmatter.name,
        version: frontmatter.version.unwrap_or_else(|| "1.0".to_string()),
        extends: frontmatter.extends,
        description: frontmatter
            .description
            .unwrap_or(body_description)
            .trim()
            .to_string(),
        pillars,
        overrides,
    })
}

fn extract_frontmatter(content: &str, path: &str) -> Result<(String, String)> {
    let content = content.trim_start_matches('\u{feff}').trim_start();
    if !content.starts_with("---") {
        return Err(CvrError::spec_parse(
            path,
            "spec must start with YAML frontmatter (---)",
        ));
    }
    let after_first = &content[3..];
    let end_pos = after_first.find("\n---").ok_or_else(|| {
        CvrError::spec_parse(path, "missing closing frontmatter delimiter (---)")
    })?;
    let frontmatter = after_first[..end_pos].trim().to_string();
    let body = after_first[end_pos + 4..].to_string();
    Ok((frontmatter, body))
}

#[derive(Debug, PartialEq)]
enum Section {
    Preamble,
    Pillar,
    Checks,
    Overrides,
}

struct BodyParser<'a> {
    path: &'a str,
    section: Section,
    description: Vec<String>,
    pillars: Vec<Pillar>,
    overrides: Vec<OverrideEntry>,
    current_check: Option<Check>,
    current_override: Option<OverrideEntry>,
    /// Which bullet field continuation lines append to.
    last_field: Option<Field>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Description,
    HowToCheck,
    Config,
}

fn parse_body(body: &str, path: &str) -> Result<(Vec<Pillar>, Vec<OverrideEntry>, String)> {
    let mut p = BodyParser {
        path,
        section: Section::Preamble,
        description: Vec::new(),
        pillars: Vec::new(),
        overrides: Vec::new(),
        current_check: None,
        current_override: None,
        last_field: None,
    };

    for raw_line in body.lines() {
        let line = raw_line.trim_end();
        if let Some(title) = heading(line, 2) {
            p.flush_check();
            p.flush_override();
            if title.eq_ignore_ascii_case("overrides") {
                p.section = Section::Overrides;
            } else {
                p.section = Section::Pillar;
                p.pillars.push(Pillar {
                    name: title.to_string(),
                    description: String::new(),
                    checks: Vec::new(),
                });
            }
            continue;
        }
        if let Some(title) = heading(line, 3) {
            p.flush_check();
            if title.eq_ignore_ascii_case("checks") && p.section != Section::Overrides {
                if p.pillars.is_empty() {
                    return Err(CvrError::spec_parse(
                        path,
                        "### Checks header found before any ## pillar",
                    ));
                }
                p.section = Section::Checks;
            }
            continue;
        }
        if let Some(id) = heading(line, 4) {
            p.start_item(id)?;
            continue;
        }
        p.content_line(line)?;
    }

    p.flush_check();
    p.flush_override();

    let description = p.description.join("\n").trim().to_string();
    Ok((p.pillars, p.overrides, description))
}

fn heading(line: &str, level: usize) -> Option<&str> {
    let prefix = "#".repeat(level);
    let rest = line.strip_prefix(prefix.as_str())?;
    if rest.starts_with('#') {
        return None;
    }
    Some(rest.trim())
}

impl BodyParser<'_> {
    fn start_item(&mut self, id: &str) -> Result<()> {
        self.flush_check();
        self.flush_override();
        self.last_field = None;

        let id = id.trim().trim_matches('`').to_string();
        if !is_kebab_case(&id) {
            return Err(CvrError::spec_parse(
                self.path,
                format!("check id '{id}' is not kebab-case"),
            ));
        }

        match self.section {
            Section::Checks => {
                self.current_check = Some(Check {
                    id,
                    severity: Severity::Minor,
                    description: String::new(),
                    config: CheckConfig::new(),
                    how_to_check: None,
                    approved_values: Vec::new(),
                });
            }
            Section::Overrides => {
                self.current_override = Some(OverrideEntry {
                    check_id: id,
                    severity: None,
                    config: CheckConfig::new(),
                });
            }
            _ => {
                return Err(CvrError::spec_parse(
                    self.path,
                    format!("check '{id}' outside a ### Checks or ## Overrides section"),
                ));
            }
        }
        Ok(())
    }

    fn content_line(&mut self, line: &str) -> Result<()> {
        if self.current_check.is_some() || self.current_override.is_some() {
            if let Some((key, value)) = bullet_field(line) {
                return self.apply_field(&key, value);
            }
            // Indented sub-bullets extend a `- **Config**:` block.
            if self.last_field == Some(Field::Config) {
                if let Some(pair) = sub_bullet_pair(line) {
                    self.insert_config(pair.0, &pair.1);
                    return Ok(());
                }
            }
            // Plain continuation lines extend the last free-form field.
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                match self.last_field {
                    Some(Field::Description) => {
                        if let Some(check) = self.current_check.as_mut() {
                            if !check.description.is_empty() {
                                check.description.push(' ');
                            }
                            check.description.push_str(trimmed);
                        }
                    }
                    Some(Field::HowToCheck) => {
                        if let Some(check) = self.current_check.as_mut() {
                            let how = check.how_to_check.get_or_insert_with(String::new);
                            if !how.is_empty() {
                                how.push(' ');
                            }
                            how.push_str(trimmed);
                        }
                    }
                    _ => {}
                }
            }
            return Ok(());
        }

        match self.section {
            Section::Preamble => {
                if !line.trim().is_empty() {
                    self.description.push(line.trim().to_string());
                }
            }
            Section::Pillar => {
                if let Some(pillar) = self.pillars.last_mut() {
                    if !line.trim().is_empty() {
                        if !pillar.description.is_empty() {
                            pillar.description.push(' ');
                        }
                        pillar.description.push_str(line.trim());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_field(&mut self, key: &str, value: String) -> Result<()> {
        let key_lower = key.to_ascii_lowercase();
        self.last_field = None;

        if key_lower == "severity" {
            let check_id = self.current_item_id();
            let severity = Severity::from_token(&value).ok_or_else(|| {
                CvrError::SpecInvalidSeverity {
                    check_id,
                    token: value.trim().to_string(),
                }
            })?;
            if let Some(check) = self.current_check.as_mut() {
                check.severity = severity;
            } else if let Some(ov) = self.current_override.as_mut() {
                ov.severity = Some(severity);
            }
            return Ok(());
        }

        if key_lower == "config" {
            self.last_field = Some(Field::Config);
            for (k, v) in inline_config_pairs(&value) {
                self.insert_config(k, &v);
            }
            return Ok(());
        }

        if let Some(check) = self.current_check.as_mut() {
            match key_lower.as_str() {
                "description" => {
                    check.description = value;
                    self.last_field = Some(Field::Description);
                }
                "how to check" => {
                    check.how_to_check = Some(value);
                    self.last_field = Some(Field::HowToCheck);
                }
                "approved values" => {
                    check.approved_values = value
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(String::from)
                        .collect();
                }
                // Unknown bullets are tolerated so specs can carry notes.
                _ => {}
            }
        }
        Ok(())
    }

    fn insert_config(&mut self, key: String, raw: &str) {
        let value = ConfigValue::parse(raw);
        if let Some(check) = self.current_check.as_mut() {
            check.config.insert(key, value);
        } else if let Some(ov) = self.current_override.as_mut() {
            ov.config.insert(key, value);
        }
    }

    fn current_item_id(&self) -> String {
        self.current_check
            .as_ref()
            .map(|c| c.id.clone())
            .or_else(|| self.current_override.as_ref().map(|o| o.check_id.clone()))
            .unwrap_or_default()
    }

    fn flush_check(&mut self) {
        if let Some(check) = self.current_check.take() {
            if let Some(pillar) = self.pillars.last_mut() {
                pillar.checks.push(check);
            }
        }
        self.last_field = None;
    }

    fn flush_override(&mut self) {
        if let Some(ov) = self.current_override.take() {
            self.overrides.push(ov);
        }
    }
}

/// `- **Key**: value` → `(Key, value)`.
fn bullet_field(line: &str) -> Option<(String, String)> {
    let rest = line.trim_start().strip_prefix("- **")?;
    let (key, after) = rest.split_once("**")?;
    let value = after.trim_start().strip_prefix(':')?;
    Some((key.trim().to_string(), value.trim().to_string()))
}

/// Indented `- key: value` under a Config bullet.
fn sub_bullet_pair(line: &str) -> Option<(String, String)> {
    if !line.starts_with("  ") && !line.starts_with('\t') {
        return None;
    }
    let rest = line.trim_start().strip_prefix("- ")?;
    let (key, value) = rest.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || key.contains("**") {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

/// `a: 1, b: x` → pairs. Commas inside `[...]` lists are preserved.
fn inline_config_pairs(value: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let mut parts = Vec::new();
    for ch in value.chars() {
        match ch {
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    for part in parts {
        if let Some((k, v)) = part.split_once(':') {
            let k = k.trim();
            if !k.is_empty() {
                pairs.push((k.to_string(), v.trim().to_string()));
            }
        }
    }
    pairs
}

fn is_kebab_case(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !id.starts_with('-')
        && !id.ends_with('-')
}
