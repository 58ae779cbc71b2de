//! Environment action: `env.get`.

use std::collections::HashMap;

use anyhow::bail;

use super::{param, Action};

/// Reads an environment variable; fails when it is unset.
pub struct EnvGet;

impl Action for EnvGet {
    fn execute(&self, params: &HashMap<String, String>) -> anyhow::Result<HashMap<String, String>> {
        let name = param(params, "name");
        if name.is_empty() {
            bail!("env.get: missing required param 'name'");
        }
        match std::env::var(name) {
            Ok(value) => Ok(HashMap::from([("value".to_string(), value)])),
            Err(_) => bail!("env.get: environment variable {name:?} not set"),
        }
    }

    fn dry_run(&self, params: &HashMap<String, String>) -> String {
        format!("Would read environment variable {:?}", param(params, "name"))
    }
}
