//! Built-in side-effect actions.
//!
//! Each action exposes a uniform execute/dry-run contract; the engine
//! never interprets output keys beyond copying those named in a step's
//! `outputs` map. The registry is closed and initialised at process
//! start; adding an action is a single-point change here.

mod env;
mod file;
mod http;
mod json;

pub use env::EnvGet;
pub use file::{FileAppend, FileWrite};
pub use http::HttpAction;
pub use json::{JsonGet, JsonSet};

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Uniform interface for named built-in actions.
pub trait Action: Send + Sync {
    /// Perform the action, returning named outputs.
    fn execute(&self, params: &HashMap<String, String>) -> anyhow::Result<HashMap<String, String>>;

    /// Describe what `execute` would do, without side effects.
    fn dry_run(&self, params: &HashMap<String, String>) -> String;
}

static REGISTRY: Lazy<HashMap<&'static str, Box<dyn Action>>> = Lazy::new(|| {
    let mut registry: HashMap<&'static str, Box<dyn Action>> = HashMap::new();
    registry.insert("file.write", Box::new(FileWrite));
    registry.insert("file.append", Box::new(FileAppend));
    registry.insert("json.get", Box::new(JsonGet));
    registry.insert("json.set", Box::new(JsonSet));
    registry.insert("env.get", Box::new(EnvGet));
    registry.insert("http", Box::new(HttpAction::new()));
    registry
});

/// Look up an action by name.
pub fn get(name: &str) -> Option<&'static dyn Action> {
    REGISTRY.get(name).map(|action| action.as_ref())
}

/// Whether the action name is registered.
pub fn is_known(name: &str) -> bool {
    REGISTRY.contains_key(name)
}

/// Fetch a string parameter, defaulting to empty when absent.
pub(crate) fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> &'a str {
    params.get(key).map(String::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_closed() {
        for name in ["file.write", "file.append", "json.get", "json.set", "env.get", "http"] {
            assert!(is_known(name), "{name} should be registered");
            assert!(get(name).is_some());
        }
        assert!(!is_known("file.shred"));
        assert!(get("file.shred").is_none());
    }
}
