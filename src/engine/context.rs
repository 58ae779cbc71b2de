//! Per-run execution state.

use std::collections::HashMap;
use std::path::PathBuf;

use uuid::Uuid;

use crate::template;

/// State carried across one plan execution.
///
/// Created at the start of a run, mutated only by the engine as steps
/// complete, discarded at the end.
#[derive(Debug)]
pub struct RunContext {
    /// Unique identifier for this run
    pub run_id: String,
    /// Root for relative paths and artifacts
    pub work_dir: PathBuf,
    /// Values visible to template resolution
    pub tmpl: template::Context,
    /// Whether destructive steps may execute
    pub approve: bool,
}

impl RunContext {
    /// Create a fresh context for one execution.
    pub fn new(
        work_dir: impl Into<PathBuf>,
        inputs: HashMap<String, String>,
        approve: bool,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            work_dir: work_dir.into(),
            tmpl: template::Context::new(inputs),
            approve,
        }
    }
}
