//! JSON actions: `json.get` and `json.set`.
//!
//! Paths are dotted key sequences into JSON objects; `json.set`
//! autovivifies intermediate objects and always writes string values.

use std::collections::HashMap;

use anyhow::{bail, Context as _};
use serde_json::{Map, Value};

use super::{param, Action};

/// Reads a value at a dotted path from a JSON file.
pub struct JsonGet;

impl Action for JsonGet {
    fn execute(&self, params: &HashMap<String, String>) -> anyhow::Result<HashMap<String, String>> {
        let file = param(params, "file");
        let path = param(params, "path");
        if file.is_empty() {
            bail!("json.get: missing required param 'file'");
        }
        if path.is_empty() {
            bail!("json.get: missing required param 'path'");
        }

        let data = std::fs::read_to_string(file).context("json.get")?;
        let root: Value = serde_json::from_str(&data).context("json.get")?;

        let value = get_path(&root, path).context("json.get")?;
        Ok(HashMap::from([("value".to_string(), render(value))]))
    }

    fn dry_run(&self, params: &HashMap<String, String>) -> String {
        format!("Would read {} from {}", param(params, "path"), param(params, "file"))
    }
}

/// Sets a string value at a dotted path in a JSON file, creating the
/// file and intermediate objects as needed.
pub struct JsonSet;

impl Action for JsonSet {
    fn execute(&self, params: &HashMap<String, String>) -> anyhow::Result<HashMap<String, String>> {
        let file = param(params, "file");
        let path = param(params, "path");
        let value = param(params, "value");
        if file.is_empty() {
            bail!("json.set: missing required param 'file'");
        }
        if path.is_empty() {
            bail!("json.set: missing required param 'path'");
        }

        let mut root: Map<String, Value> = match std::fs::read_to_string(file) {
            Ok(data) => serde_json::from_str(&data).context("json.set")?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(anyhow::Error::new(e).context("json.set")),
        };

        set_path(&mut root, path, value);

        let data = serde_json::to_string_pretty(&root).context("json.set")?;
        std::fs::write(file, data).context("json.set")?;
        Ok(HashMap::from([("file".to_string(), file.to_string())]))
    }

    fn dry_run(&self, params: &HashMap<String, String>) -> String {
        format!(
            "Would set {} = {:?} in {}",
            param(params, "path"),
            param(params, "value"),
            param(params, "file")
        )
    }
}

fn get_path<'a>(root: &'a Value, path: &str) -> anyhow::Result<&'a Value> {
    let mut current = root;
    for key in path.split('.') {
        let Some(object) = current.as_object() else {
            bail!("key {key:?}: not an object");
        };
        current = match object.get(key) {
            Some(value) => value,
            None => bail!("key {key:?} not found"),
        };
    }
    Ok(current)
}

fn set_path(root: &mut Map<String, Value>, path: &str, value: &str) {
    let mut keys = path.split('.').peekable();
    let mut current = root;
    while let Some(key) = keys.next() {
        if keys.peek().is_none() {
            current.insert(key.to_string(), Value::String(value.to_string()));
            return;
        }
        let entry =
            current.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else { return };
        current = next;
    }
}

/// Flatten a JSON value to its string form; strings are unquoted.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
