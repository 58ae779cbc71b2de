//! File actions: `file.write` and `file.append`.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use anyhow::{bail, Context as _};

use super::{param, Action};

/// Writes content to a file, creating parent directories as needed.
pub struct FileWrite;

impl Action for FileWrite {
    fn execute(&self, params: &HashMap<String, String>) -> anyhow::Result<HashMap<String, String>> {
        let path = param(params, "path");
        let content = param(params, "content");
        if path.is_empty() {
            bail!("file.write: missing required param 'path'");
        }
        if content.is_empty() {
            bail!("file.write: missing required param 'content'");
        }
        create_parent(path).context("file.write")?;
        std::fs::write(path, content).context("file.write")?;
        Ok(HashMap::from([("path".to_string(), path.to_string())]))
    }

    fn dry_run(&self, params: &HashMap<String, String>) -> String {
        format!(
            "Would write {} bytes to {}",
            param(params, "content").len(),
            param(params, "path")
        )
    }
}

/// Appends content to a file, creating it if missing.
pub struct FileAppend;

impl Action for FileAppend {
    fn execute(&self, params: &HashMap<String, String>) -> anyhow::Result<HashMap<String, String>> {
        let path = param(params, "path");
        let content = param(params, "content");
        if path.is_empty() {
            bail!("file.append: missing required param 'path'");
        }
        if content.is_empty() {
            bail!("file.append: missing required param 'content'");
        }
        create_parent(path).context("file.append")?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .context("file.append")?;
        file.write_all(content.as_bytes()).context("file.append")?;
        Ok(HashMap::from([("path".to_string(), path.to_string())]))
    }

    fn dry_run(&self, params: &HashMap<String, String>) -> String {
        format!(
            "Would append {} bytes to {}",
            param(params, "content").len(),
            param(params, "path")
        )
    }
}

fn create_parent(path: &str) -> std::io::Result<()> {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_write_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out.txt");
        let outputs = FileWrite
            .execute(&params(&[("path", target.to_str().unwrap()), ("content", "hello")]))
            .unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
        assert_eq!(outputs["path"], target.to_str().unwrap());
    }

    #[test]
    fn test_write_requires_path_and_content() {
        let err = FileWrite.execute(&params(&[("content", "x")])).unwrap_err();
        assert!(err.to_string().contains("missing required param 'path'"));
        let err = FileWrite.execute(&params(&[("path", "/tmp/x")])).unwrap_err();
        assert!(err.to_string().contains("missing required param 'content'"));
    }

    #[test]
    fn test_append_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("log.txt");
        let p = params(&[("path", target.to_str().unwrap()), ("content", "one\n")]);
        FileAppend.execute(&p).unwrap();
        let p = params(&[("path", target.to_str().unwrap()), ("content", "two\n")]);
        FileAppend.execute(&p).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_dry_run_descriptions() {
        let p = params(&[("path", "out.txt"), ("content", "12345")]);
        assert_eq!(FileWrite.dry_run(&p), "Would write 5 bytes to out.txt");
        assert_eq!(FileAppend.dry_run(&p), "Would append 5 bytes to out.txt");
    }
}
