//! Spec loading: search roots, `extends` resolution, override merging,
//! and a read-mostly cache.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{CvrError, Result};
use crate::spec::model::{Check, OverrideEntry, Pillar, Spec, SpecDocument};
use crate::spec::parser::parse_spec_markdown;

/// Project-root spec files probed after the search roots.
const DISCOVERY_FILES: &[&str] = &["DESIGN-SPEC.md", "design-spec.md", ".claude/DESIGN-SPEC.md"];

/// A resolved spec plus the non-fatal warnings produced while resolving it.
#[derive(Debug, Clone)]
pub struct LoadedSpec {
    pub spec: Spec,
    pub warnings: Vec<String>,
}

pub struct SpecLoader {
    search_roots: Vec<PathBuf>,
    cache: Mutex<HashMap<(String, u64), Arc<LoadedSpec>>>,
}

impl SpecLoader {
    pub fn new(search_roots: Vec<PathBuf>) -> Self {
        Self {
            search_roots,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Loader with the conventional roots: `./specs`, then `./.canvas/specs`.
    pub fn with_default_roots() -> Self {
        Self::new(vec![PathBuf::from("specs"), PathBuf::from(".canvas/specs")])
    }

    /// Load and fully resolve a spec by id or path. Results are cached by
    /// `(id, path-hash)` and immutable once loaded.
    pub fn load(&self, spec_id: &str) -> Result<Arc<LoadedSpec>> {
        let path = self.resolve_path(spec_id, None)?;
        let key = (spec_id.to_string(), path_hash(&path));

        if let Some(cached) = self.cache.lock().expect("spec cache poisoned").get(&key) {
            return Ok(Arc::clone(cached));
        }

        let mut loading = HashSet::new();
        let mut warnings = Vec::new();
        let spec = self.load_resolved(&path, &mut loading, &mut warnings)?;
        validate_resolved(&spec, &path)?;

        let loaded = Arc::new(LoadedSpec { spec, warnings });
        self.cache
            .lock()
            .expect("spec cache poisoned")
            .insert(key, Arc::clone(&loaded));
        Ok(loaded)
    }

    fn load_resolved(
        &self,
        path: &Path,
        loading: &mut HashSet<PathBuf>,
        warnings: &mut Vec<String>,
    ) -> Result<Spec> {
        let canonical = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        if !loading.insert(canonical.clone()) {
            return Err(CvrError::SpecCycle(canonical.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CvrError::SpecNotFound(format!("{}: {e}", path.display())))?;
        let doc = parse_spec_markdown(&content, &path.display().to_string())?;

        let resolved = if let Some(parent_id) = &doc.extends {
            let parent_path = self.resolve_path(parent_id, path.parent())?;
            let parent = self.load_resolved(&parent_path, loading, warnings)?;
            merge_into_parent(parent, doc, path, warnings)
        } else {
            let (mut spec, overrides) = base_spec(doc, path);
            apply_overrides(&mut spec, overrides, warnings);
            spec
        };

        loading.remove(&canonical);
        Ok(resolved)
    }

    /// Candidate order: the id as a literal path (absolute, relative to the
    /// extending spec, or relative to the working directory), each search
    /// root with and without an `.md` extension, then the project-root
    /// discovery files for the conventional default ids.
    fn resolve_path(&self, spec_id: &str, relative_to: Option<&Path>) -> Result<PathBuf> {
        let as_path = PathBuf::from(spec_id);
        let mut candidates: Vec<PathBuf> = Vec::new();

        if let Some(base) = relative_to {
            candidates.push(base.join(&as_path));
            candidates.push(base.join(format!("{spec_id}.md")));
        }
        candidates.push(as_path);
        for root in &self.search_roots {
            candidates.push(root.join(spec_id));
            candidates.push(root.join(format!("{spec_id}.md")));
        }

        for candidate in candidates {
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        if spec_id.eq_ignore_ascii_case("default") || spec_id.eq_ignore_ascii_case("design-spec") {
            for discovery in DISCOVERY_FILES {
                let candidate = PathBuf::from(discovery);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }

        Err(CvrError::SpecNotFound(spec_id.to_string()))
    }
}

fn base_spec(doc: SpecDocument, path: &Path) -> (Spec, Vec<OverrideEntry>) {
    let overrides = doc.overrides;
    (
        Spec {
            name: doc.name,
            version: doc.version,
            description: doc.description,
            resolved_from: path.display().to_string(),
            pillars: doc.pillars,
        },
        overrides,
    )
}

/// Apply a document's `## Overrides` section onto its checks.
fn apply_overrides(spec: &mut Spec, overrides: Vec<OverrideEntry>, warnings: &mut Vec<String>) {
    for ov in overrides {
        if !apply_one_override(&mut spec.pillars, &ov) {
            warnings.push(format!(
                "override targets unknown check id '{}'",
                ov.check_id
            ));
        }
    }
}

fn apply_one_override(pillars: &mut [Pillar], ov: &OverrideEntry) -> bool {
    for pillar in pillars.iter_mut() {
        if let Some(check) = pillar.checks.iter_mut().find(|c| c.id == ov.check_id) {
            if let Some(severity) = ov.severity {
                check.severity = severity;
            }
            for (k, v) in &ov.config {
                check.config.insert(k.clone(), v.clone());
            }
            return true;
        }
    }
    false
}

/// Merge a child document over its resolved parent. Child redefinitions
/// replace severity/description and merge config shallowly; the child's
/// `## Overrides` section is applied last and wins over redefinitions.
fn merge_into_parent(
    parent: Spec,
    child: SpecDocument,
    path: &Path,
    warnings: &mut Vec<String>,
) -> Spec {
    let mut pillars = parent.pillars;

    for child_pillar in child.pillars {
        let pillar_name = child_pillar.name.clone();
        if let Some(existing) = pillars.iter_mut().find(|p| p.name == pillar_name) {
            if !child_pillar.description.is_empty() {
                existing.description = child_pillar.description.clone();
            }
        } else {
            pillars.push(Pillar {
                name: pillar_name.clone(),
                description: child_pillar.description.clone(),
                checks: Vec::new(),
            });
        }

        for check in child_pillar.checks {
            // Redefinitions merge over the inherited check wherever it
            // lives; genuinely new checks join the child's pillar.
            if find_check_mut(&mut pillars, &check.id).is_some() {
                merge_check(&mut pillars, check);
            } else if let Some(target) = pillars.iter_mut().find(|p| p.name == pillar_name) {
                target.checks.push(check);
            }
        }
    }

    let mut spec = Spec {
        name: child.name,
        version: child.version,
        description: if child.description.is_empty() {
            parent.description
        } else {
            child.description
        },
        resolved_from: path.display().to_string(),
        pillars,
    };

    apply_overrides(&mut spec, child.overrides, warnings);
    spec
}

fn merge_check(pillars: &mut [Pillar], incoming: Check) {
    if let Some(existing) = find_check_mut(pillars, &incoming.id) {
        existing.severity = incoming.severity;
        if !incoming.description.is_empty() {
            existing.description = incoming.description;
        }
        for (k, v) in incoming.config {
            existing.config.insert(k, v);
        }
        if incoming.how_to_check.is_some() {
            existing.how_to_check = incoming.how_to_check;
        }
        if !incoming.approved_values.is_empty() {
            existing.approved_values = incoming.approved_values;
        }
    }
}

fn find_check_mut<'a>(pillars: &'a mut [Pillar], id: &str) -> Option<&'a mut Check> {
    pillars
        .iter_mut()
        .flat_map(|p| p.checks.iter_mut())
        .find(|c| c.id == id)
}

fn validate_resolved(spec: &Spec, path: &Path) -> Result<()> {
    let mut seen = HashSet::new();
    for (_, check) in spec.checks() {
        if !seen.insert(check.id.as_str()) {
            return Err(CvrError::spec_parse(
                path.display().to_string(),
                format!("duplicate check id '{}' in resolved spec", check.id),
            ));
        }
    }
    Ok(())
}

fn path_hash(path: &Path) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .hash(&mut hasher);
    hasher.finish()
}
