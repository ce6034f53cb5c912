//! Resolved spec model: pillars, checks, config values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::types::Severity;

/// A scalar or list config knob attached to a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    /// Parse a raw token: booleans, then numbers, then a bare string.
    pub fn parse(raw: &str) -> ConfigValue {
        let trimmed = raw.trim();
        if let Some(body) = trimmed
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
        {
            let items = body
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(ConfigValue::parse)
                .collect();
            return ConfigValue::List(items);
        }
        match trimmed {
            "true" => return ConfigValue::Bool(true),
            "false" => return ConfigValue::Bool(false),
            _ => {}
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            return ConfigValue::Number(n);
        }
        ConfigValue::String(trimmed.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => Some(*n),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            ConfigValue::String(s) => s.clone(),
            ConfigValue::List(items) => {
                let inner: Vec<String> = items.iter().map(ConfigValue::render).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }
}

/// Ordered, stable config map.
pub type CheckConfig = BTreeMap<String, ConfigValue>;

/// Read a numeric knob with a default.
pub fn config_f64(config: &CheckConfig, key: &str, default: f64) -> f64 {
    config.get(key).and_then(ConfigValue::as_f64).unwrap_or(default)
}

/// Read a string knob with a default.
pub fn config_str<'a>(config: &'a CheckConfig, key: &str, default: &'a str) -> &'a str {
    config.get(key).and_then(ConfigValue::as_str).unwrap_or(default)
}

/// One reviewable property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: CheckConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub how_to_check: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approved_values: Vec<String>,
}

/// A named grouping of related checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pillar {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub checks: Vec<Check>,
}

/// Partial update declared in a spec's `## Overrides` section.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideEntry {
    pub check_id: String,
    pub severity: Option<Severity>,
    pub config: CheckConfig,
}

/// A parsed spec document, before `extends` resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecDocument {
    pub name: String,
    pub version: String,
    pub extends: Option<String>,
    pub description: String,
    pub pillars: Vec<Pillar>,
    pub overrides: Vec<OverrideEntry>,
}

/// A fully resolved spec: inheritance applied, overrides consumed,
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub resolved_from: String,
    pub pillars: Vec<Pillar>,
}

impl Spec {
    pub fn checks(&self) -> impl Iterator<Item = (&Pillar, &Check)> {
        self.pillars
            .iter()
            .flat_map(|p| p.checks.iter().map(move |c| (p, c)))
    }

    pub fn find_check(&self, id: &str) -> Option<&Check> {
        self.checks().map(|(_, c)| c).find(|c| c.id == id)
    }

    pub fn check_count(&self) -> usize {
        self.pillars.iter().map(|p| p.checks.len()).sum()
    }

    /// Serialize back to the markdown form the loader accepts. Used for the
    /// load/dump round-trip and for exporting resolved specs.
    pub fn to_canonical_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("---\n");
        let _ = writeln!(out, "name: {}", self.name);
        let _ = writeln!(out, "version: \"{}\"", self.version);
        out.push_str("---\n");
        if !self.description.is_empty() {
            let _ = writeln!(out, "\n{}", self.description);
        }
        for pillar in &self.pillars {
            let _ = writeln!(out, "\n## {}", pillar.name);
            if !pillar.description.is_empty() {
                let _ = writeln!(out, "\n{}", pillar.description);
            }
            out.push_str("\n### Checks\n");
            for check in &pillar.checks {
                let _ = writeln!(out, "\n#### {}", check.id);
                let _ = writeln!(out, "- **Severity**: {}", check.severity);
                if !check.description.is_empty() {
                    let _ = writeln!(out, "- **Description**: {}", check.description);
                }
                if !check.config.is_empty() {
                    let pairs: Vec<String> = check
                        .config
                        .iter()
                        .map(|(k, v)| format!("{k}: {}", v.render()))
                        .collect();
                    let _ = writeln!(out, "- **Config**: {}", pairs.join(", "));
                }
                if let Some(how) = &check.how_to_check {
                    let _ = writeln!(out, "- **How to check**: {how}");
                }
                if !check.approved_values.is_empty() {
                    let _ = writeln!(
                        out,
                        "- **Approved values**: {}",
                        check.approved_values.join(", ")
                    );
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_value_parses_scalars() {
        assert_eq!(ConfigValue::parse("true"), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::parse("4.5"), ConfigValue::Number(4.5));
        assert_eq!(ConfigValue::parse("44"), ConfigValue::Number(44.0));
        assert_eq!(
            ConfigValue::parse("AA"),
            ConfigValue::String("AA".to_string())
        );
    }

    #[test]
    fn config_value_parses_lists() {
        let v = ConfigValue::parse("[#fff, #000, 12]");
        match v {
            ConfigValue::List(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], ConfigValue::String("#fff".into()));
                assert_eq!(items[2], ConfigValue::Number(12.0));
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn config_helpers_fall_back_to_defaults() {
        let mut config = CheckConfig::new();
        config.insert("minimum_ratio".into(), ConfigValue::Number(3.0));
        assert_eq!(config_f64(&config, "minimum_ratio", 4.5), 3.0);
        assert_eq!(config_f64(&config, "missing", 4.5), 4.5);
        assert_eq!(config_str(&config, "missing", "C"), "C");
    }

    #[test]
    fn render_round_trips_through_parse() {
        for v in [
            ConfigValue::Bool(false),
            ConfigValue::Number(44.0),
            ConfigValue::Number(4.5),
            ConfigValue::String("AA".into()),
            ConfigValue::List(vec![
                ConfigValue::String("#fff".into()),
                ConfigValue::Number(2.0),
            ]),
        ] {
            assert_eq!(ConfigValue::parse(&v.render()), v);
        }
    }
}
