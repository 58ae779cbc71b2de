//! Plan model, loader, and validator.
//!
//! Plans are YAML runbooks with typed inputs, an ordered step list,
//! and a small template language for inter-step dataflow.

mod loader;
mod schema;
mod validator;

pub use loader::{discover_plans, load_file, load_str};
pub use schema::{HttpRequest, Input, Plan, Step, StepKind};
pub use validator::validate;
