//! Template reference resolution.
//!
//! Plans embed `${{inputs.NAME}}` and `${{steps.ID.outputs.NAME}}`
//! references inside string-valued fields. The grammar is small enough
//! for a lexical scan; there are no filters, conditionals, or nesting.
//! A leading `$` is consumed when present, so both the `${{…}}` and
//! bare `{{…}}` spellings resolve to the same value.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RunError;

static STEP_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$?\{\{steps\.([^.}]+)\.outputs\.([^}]+)\}\}").unwrap());
static INPUT_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$?\{\{inputs\.([^}]+)\}\}").unwrap());

/// Values available for template resolution during one run.
#[derive(Debug, Default)]
pub struct Context {
    /// Provided input values
    pub inputs: HashMap<String, String>,
    /// Captured outputs, keyed by step ID then output name
    pub step_outputs: HashMap<String, HashMap<String, String>>,
}

impl Context {
    /// Create a context over the given inputs, with no step outputs yet.
    pub fn new(inputs: HashMap<String, String>) -> Self {
        Self { inputs, step_outputs: HashMap::new() }
    }

    /// Record an output value for a step.
    pub fn insert_output(&mut self, step_id: &str, name: &str, value: String) {
        self.step_outputs.entry(step_id.to_string()).or_default().insert(name.to_string(), value);
    }
}

/// Replace every step-output and input reference in `s`.
///
/// Substitution is single-pass: inserted text is never re-scanned. An
/// unresolved reference fails with a `VALIDATION_ERROR`.
pub fn resolve(s: &str, ctx: &Context) -> Result<String, RunError> {
    let mut unresolved: Option<String> = None;

    let resolved = STEP_REF_RE
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let (step_id, output) = (&caps[1], &caps[2]);
            match ctx.step_outputs.get(step_id) {
                Some(outputs) => match outputs.get(output) {
                    Some(value) => value.clone(),
                    None => {
                        unresolved.get_or_insert_with(|| {
                            format!("unresolved output \"{output}\" on step \"{step_id}\"")
                        });
                        String::new()
                    }
                },
                None => {
                    unresolved.get_or_insert_with(|| {
                        format!("unresolved step reference \"{step_id}\"")
                    });
                    String::new()
                }
            }
        })
        .into_owned();
    if let Some(message) = unresolved {
        return Err(RunError::validation(message));
    }

    let mut unresolved: Option<String> = None;
    let resolved = INPUT_REF_RE
        .replace_all(&resolved, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match ctx.inputs.get(name) {
                Some(value) => value.clone(),
                None => {
                    unresolved.get_or_insert_with(|| format!("unresolved input \"{name}\""));
                    String::new()
                }
            }
        })
        .into_owned();
    if let Some(message) = unresolved {
        return Err(RunError::validation(message));
    }

    Ok(resolved)
}

/// Extract `(step_id, output_name)` pairs referenced by `s`.
pub(crate) fn step_refs(s: &str) -> Vec<(String, String)> {
    STEP_REF_RE.captures_iter(s).map(|c| (c[1].to_string(), c[2].to_string())).collect()
}

/// Extract input names referenced by `s`.
pub(crate) fn input_refs(s: &str) -> Vec<String> {
    INPUT_REF_RE.captures_iter(s).map(|c| c[1].to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        let mut ctx = Context::new(HashMap::from([("name".to_string(), "world".to_string())]));
        ctx.insert_output("s1", "version", "1.2.3".to_string());
        ctx
    }

    #[test]
    fn test_resolve_input() {
        assert_eq!(resolve("hello ${{inputs.name}}", &ctx()).unwrap(), "hello world");
    }

    #[test]
    fn test_resolve_step_output() {
        assert_eq!(resolve("v=${{steps.s1.outputs.version}}", &ctx()).unwrap(), "v=1.2.3");
    }

    #[test]
    fn test_resolve_bare_braces_spelling() {
        assert_eq!(resolve("hello {{inputs.name}}", &ctx()).unwrap(), "hello world");
        assert_eq!(resolve("v={{steps.s1.outputs.version}}", &ctx()).unwrap(), "v=1.2.3");
    }

    #[test]
    fn test_resolve_mixed_references() {
        let out = resolve("deploy ${{inputs.name}} ${{steps.s1.outputs.version}}", &ctx()).unwrap();
        assert_eq!(out, "deploy world 1.2.3");
    }

    #[test]
    fn test_unresolved_input_fails() {
        let err = resolve("${{inputs.missing}}", &ctx()).unwrap_err();
        assert!(err.to_string().contains("unresolved input"));
    }

    #[test]
    fn test_unresolved_step_fails() {
        let err = resolve("${{steps.nope.outputs.val}}", &ctx()).unwrap_err();
        assert!(err.to_string().contains("unresolved step reference"));
    }

    #[test]
    fn test_unresolved_output_fails() {
        let err = resolve("${{steps.s1.outputs.missing}}", &ctx()).unwrap_err();
        assert!(err.to_string().contains("unresolved output"));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let once = resolve("hello ${{inputs.name}}", &ctx()).unwrap();
        let twice = resolve(&once, &ctx()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_substituted_values_not_rescanned() {
        let mut ctx = ctx();
        ctx.inputs.insert("tricky".to_string(), "${{inputs.name}}".to_string());
        // The inserted value still looks like a reference; a single
        // pass must leave it alone.
        assert_eq!(resolve("x=${{inputs.tricky}}", &ctx).unwrap(), "x=${{inputs.name}}");
    }

    #[test]
    fn test_extract_refs() {
        let refs = step_refs("a ${{steps.one.outputs.x}} b ${{steps.two.outputs.y}}");
        assert_eq!(
            refs,
            vec![
                ("one".to_string(), "x".to_string()),
                ("two".to_string(), "y".to_string())
            ]
        );
        assert_eq!(input_refs("${{inputs.a}} and ${{inputs.b}}"), vec!["a", "b"]);
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(resolve("no refs here $HOME {{ other }}", &ctx()).unwrap(), "no refs here $HOME {{ other }}");
    }
}
