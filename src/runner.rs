//! Shell command execution.
//!
//! Commands run through `sh -c` with a working directory, capturing
//! full stdout and stderr. A non-zero exit is propagated verbatim; a
//! failure to start the shell is reported as exit 1 with the error on
//! stderr, never as a Rust-level error.

use std::path::Path;
use std::process::Command;

/// Captured result of a shell command.
#[derive(Debug)]
pub struct ShellResult {
    /// Full standard output
    pub stdout: String,
    /// Full standard error
    pub stderr: String,
    /// Process exit code (1 when the shell could not be started)
    pub exit_code: i32,
}

impl ShellResult {
    /// Whether the command exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a command via `sh -c` in the given working directory.
pub fn run(command: &str, work_dir: &Path) -> ShellResult {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    if !work_dir.as_os_str().is_empty() {
        cmd.current_dir(work_dir);
    }

    match cmd.output() {
        Ok(output) => ShellResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            // A signal-terminated process has no code; treat as failure.
            exit_code: output.status.code().unwrap_or(1),
        },
        Err(e) => ShellResult {
            stdout: String::new(),
            stderr: format!("failed to start shell: {e}"),
            exit_code: 1,
        },
    }
}
