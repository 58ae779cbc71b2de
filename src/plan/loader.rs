//! Plan loader.
//!
//! Parses YAML plan files into [`Plan`] values. The loader rejects
//! only structurally unusable documents (bad YAML, missing name, no
//! steps); everything semantic is the validator's job.

use std::path::{Path, PathBuf};

use super::Plan;
use crate::error::RunError;

/// Parse a plan from a file.
pub fn load_file(path: &Path) -> Result<Plan, RunError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RunError::validation(format!("reading plan file: {e}")))?;
    load_str(&content)
}

/// Parse a plan from YAML text.
pub fn load_str(content: &str) -> Result<Plan, RunError> {
    let plan: Plan = serde_yaml::from_str(content)
        .map_err(|e| RunError::validation(format!("parsing YAML: {e}")))?;
    if plan.steps.is_empty() {
        return Err(RunError::validation("plan has no steps"));
    }
    if plan.name.is_empty() {
        return Err(RunError::validation("plan has no name"));
    }
    Ok(plan)
}

/// Discover plans in a directory (non-recursive, `*.yaml` only).
///
/// Files that fail to load are logged and skipped.
pub fn discover_plans(dir: &Path) -> Vec<(PathBuf, Plan)> {
    let mut paths: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "yaml"))
            .collect(),
        Err(_) => return Vec::new(),
    };
    paths.sort();

    let mut plans = Vec::new();
    for path in paths {
        match load_file(&path) {
            Ok(plan) => plans.push((path, plan)),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Failed to load plan");
            }
        }
    }
    plans
}
