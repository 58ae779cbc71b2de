//! Run-scoped artifact persistence.
//!
//! Each run owns `<work_dir>/.declaragent/runs/<run-id>/` with per-step
//! stream files under `steps/` and the final `result.json`. Runs never
//! share a directory, so concurrent executions cannot collide.

use std::io;
use std::path::{Path, PathBuf};

/// Errors from persisting artifacts.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("creating artifact dir: {0}")]
    Create(io::Error),

    #[error("writing artifact: {0}")]
    Write(io::Error),

    #[error("encoding result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Manages artifact storage for a single run.
#[derive(Debug)]
pub struct Store {
    /// The run this store belongs to
    pub run_id: String,
    /// Root directory of this run's artifacts
    pub base_dir: PathBuf,
}

impl Store {
    /// Create the artifact directory tree for a run rooted at `work_dir`.
    pub fn new(run_id: &str, work_dir: &Path) -> Result<Self, StoreError> {
        let base_dir = work_dir.join(".declaragent").join("runs").join(run_id);
        std::fs::create_dir_all(base_dir.join("steps")).map_err(StoreError::Create)?;
        Ok(Self { run_id: run_id.to_string(), base_dir })
    }

    /// Write stdout/stderr for a step; empty streams produce no file.
    pub fn write_step_output(
        &self,
        step_id: &str,
        stdout: &str,
        stderr: &str,
    ) -> Result<(), StoreError> {
        let steps_dir = self.base_dir.join("steps");
        if !stdout.is_empty() {
            std::fs::write(steps_dir.join(format!("{step_id}.stdout")), stdout)
                .map_err(StoreError::Write)?;
        }
        if !stderr.is_empty() {
            std::fs::write(steps_dir.join(format!("{step_id}.stderr")), stderr)
                .map_err(StoreError::Write)?;
        }
        Ok(())
    }

    /// Write the final result JSON.
    pub fn write_result<T: serde::Serialize>(&self, result: &T) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(result)?;
        std::fs::write(self.base_dir.join("result.json"), data).map_err(StoreError::Write)
    }
}
