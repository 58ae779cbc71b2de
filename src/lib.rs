//! # DeclarAgent
//!
//! Declarative runbook executor for AI agents.
//!
//! A plan is a YAML document describing a linear sequence of steps
//! (shell commands, HTTP requests, or named built-in actions) with
//! typed inputs, inter-step dataflow via a small template language,
//! and explicit marking of destructive operations. DeclarAgent
//! validates plans statically, simulates them (explain / dry-run),
//! executes them against the host, and exposes itself as a JSON-RPC
//! 2.0 tool server over stdio and SSE so an LLM host can enumerate
//! and invoke plans as tools.
//!
//! ## Quick Start
//!
//! ```bash
//! # Validate, preview, then run a plan
//! declaragent validate release.yaml
//! declaragent dry-run release.yaml --input version=1.2.3
//! declaragent run release.yaml --input version=1.2.3 --approve
//!
//! # Serve plans as tools
//! declaragent mcp --plans ./plans
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod action;
pub mod artifact;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod plan;
pub mod runner;
pub mod template;

// Re-export commonly used types
pub use engine::{execute, Mode, RunContext, RunResult, StepResult, StepStatus};
pub use error::{ErrorType, RunError};
pub use plan::{load_file, load_str, validate, Plan, Step};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "declaragent";
