//! Plan schema definitions.
//!
//! Defines the YAML structure for plan files. Unknown keys at any
//! level are ignored; all semantic checks live in the validator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A declarative runbook: named inputs plus an ordered list of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Name of the plan; doubles as the tool identifier when exposed
    #[serde(default)]
    pub name: String,

    /// Description of what this plan does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Input parameters supplied by the caller
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub inputs: HashMap<String, Input>,

    /// Steps to execute, in file order
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A plan-level input parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Input {
    /// Whether the caller must supply a value
    #[serde(default)]
    pub required: bool,

    /// Description shown in generated tool schemas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Value used when the caller supplies none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Input {
    /// The default value, or empty when none is set.
    pub fn default_value(&self) -> &str {
        self.default.as_deref().unwrap_or_default()
    }
}

/// A single step in a plan.
///
/// Exactly one of `run`, `action`, or `http` must be set; the
/// validator enforces this, and [`Step::kind`] exposes the result as a
/// tag for dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Unique identifier within the plan
    #[serde(default)]
    pub id: String,

    /// Human-readable label (YAML key `name`)
    #[serde(default, rename = "name", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Shell command to execute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    /// Name of a registered built-in action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Action parameters (YAML key `with`)
    #[serde(default, rename = "with", skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, String>,

    /// HTTP request to send
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpRequest>,

    /// Captured values, mapping output name to a source selector
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub outputs: HashMap<String, String>,

    /// Whether this step needs explicit approval to execute
    #[serde(default)]
    pub destructive: bool,
}

/// The three step shapes, as a dispatch tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Run,
    Action,
    Http,
}

impl Step {
    fn has_run(&self) -> bool {
        self.run.as_deref().is_some_and(|s| !s.is_empty())
    }

    fn has_action(&self) -> bool {
        self.action.as_deref().is_some_and(|s| !s.is_empty())
    }

    fn has_http(&self) -> bool {
        self.http.is_some()
    }

    /// Number of action shapes present; valid steps have exactly one.
    pub fn shape_count(&self) -> usize {
        usize::from(self.has_run()) + usize::from(self.has_action()) + usize::from(self.has_http())
    }

    /// The step's kind, when exactly one shape is set.
    pub fn kind(&self) -> Option<StepKind> {
        match (self.has_run(), self.has_action(), self.has_http()) {
            (true, false, false) => Some(StepKind::Run),
            (false, true, false) => Some(StepKind::Action),
            (false, false, true) => Some(StepKind::Http),
            _ => None,
        }
    }
}

/// An HTTP request step; every field is template-bearing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Request URL
    #[serde(default)]
    pub url: String,

    /// HTTP method (default GET)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Request headers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl HttpRequest {
    /// The method to send, defaulting to GET.
    pub fn method_or_default(&self) -> &str {
        match self.method.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => "GET",
        }
    }
}

impl Plan {
    /// Get the number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get input names.
    #[must_use]
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_yaml() {
        let yaml = r#"
name: deploy
description: Deploy to staging
inputs:
  environment:
    required: true
    description: Target environment
  tag:
    default: latest
steps:
  - id: build
    name: Build the image
    run: docker build -t app .
  - id: push
    run: docker push app
    destructive: true
"#;

        let plan: Plan = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(plan.name, "deploy");
        assert_eq!(plan.description, Some("Deploy to staging".to_string()));
        assert_eq!(plan.step_count(), 2);

        assert!(plan.inputs["environment"].required);
        assert_eq!(plan.inputs["tag"].default_value(), "latest");

        assert_eq!(plan.steps[0].kind(), Some(StepKind::Run));
        assert_eq!(plan.steps[0].description.as_deref(), Some("Build the image"));
        assert!(plan.steps[1].destructive);
    }

    #[test]
    fn test_step_kinds() {
        let yaml = r#"
id: s1
action: file.write
with:
  path: out.txt
  content: hello
outputs:
  where: path
"#;
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.kind(), Some(StepKind::Action));
        assert_eq!(step.shape_count(), 1);
        assert_eq!(step.params["path"], "out.txt");
        assert_eq!(step.outputs["where"], "path");
    }

    #[test]
    fn test_http_step() {
        let yaml = r#"
id: fetch
http:
  url: https://example.com/api
  headers:
    Authorization: Bearer abc
  body: '{"q": 1}'
"#;
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.kind(), Some(StepKind::Http));
        let http = step.http.unwrap();
        assert_eq!(http.method_or_default(), "GET");
        assert_eq!(http.headers["Authorization"], "Bearer abc");
    }

    #[test]
    fn test_ambiguous_step_has_no_kind() {
        let yaml = r#"
id: s1
run: echo x
action: file.write
"#;
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.kind(), None);
        assert_eq!(step.shape_count(), 2);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let yaml = r#"
name: tolerant
totally_unknown: true
steps:
  - id: s1
    run: echo hi
    another_unknown: 42
"#;
        let plan: Plan = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(plan.name, "tolerant");
        assert_eq!(plan.steps.len(), 1);
    }
}
