//! Plan validator.
//!
//! One forward pass over the steps, maintaining a seen-set of IDs and
//! a table of declared outputs, so every dataflow reference is checked
//! against strictly earlier steps.

use std::collections::{HashMap, HashSet};

use super::Step;
use crate::action;
use crate::error::RunError;
use crate::plan::Plan;
use crate::template;

const SHAPE_HINT: &str = "A step must have exactly one of: run, action, or http";
const ACTION_HINT: &str =
    "Known actions: file.write, file.append, json.get, json.set, env.get, http";

/// Check a plan for structural and semantic correctness.
///
/// When `provided_inputs` is `None` the required-input checks are
/// skipped, which suits a syntactic-only pass; otherwise every
/// required input must be provided or carry a non-empty default.
pub fn validate(
    plan: &Plan,
    provided_inputs: Option<&HashMap<String, String>>,
) -> Result<(), RunError> {
    if let Some(provided) = provided_inputs {
        for (name, input) in &plan.inputs {
            if input.required
                && !provided.contains_key(name)
                && input.default_value().is_empty()
            {
                return Err(RunError::validation(format!("missing required input \"{name}\""))
                    .with_hint(format!("Provide --input {name}=<value>")));
            }
        }
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut step_outputs: HashMap<&str, HashSet<&str>> = HashMap::new();

    for (i, step) in plan.steps.iter().enumerate() {
        if step.id.is_empty() {
            return Err(RunError::validation(format!("step at index {i} has no id")));
        }
        if seen.contains_key(step.id.as_str()) {
            return Err(RunError::validation(format!("duplicate step id \"{}\"", step.id)));
        }
        seen.insert(&step.id, i);

        match step.shape_count() {
            1 => {}
            0 => {
                return Err(RunError::validation(format!(
                    "step \"{}\" has none of run/action/http",
                    step.id
                ))
                .with_hint(SHAPE_HINT));
            }
            _ => {
                return Err(RunError::validation(format!(
                    "step \"{}\" has multiple of run/action/http",
                    step.id
                ))
                .with_hint(SHAPE_HINT));
            }
        }

        if let Some(http) = &step.http {
            if http.url.is_empty() {
                return Err(RunError::validation(format!(
                    "step \"{}\": http requires a url",
                    step.id
                )));
            }
        }

        if let Some(name) = step.action.as_deref() {
            if !name.is_empty() && !action::is_known(name) {
                return Err(RunError::tool_not_found(format!(
                    "step \"{}\": unknown action \"{name}\"",
                    step.id
                ))
                .with_hint(ACTION_HINT));
            }
        }

        for candidate in step_strings(step) {
            for (ref_id, output) in template::step_refs(candidate) {
                let Some(&idx) = seen.get(ref_id.as_str()) else {
                    return Err(RunError::validation(format!(
                        "step \"{}\" references unknown step \"{ref_id}\"",
                        step.id
                    )));
                };
                if idx >= i {
                    return Err(RunError::validation(format!(
                        "step \"{}\" has forward reference to step \"{ref_id}\"",
                        step.id
                    )));
                }
                match step_outputs.get(ref_id.as_str()) {
                    Some(outputs) if outputs.contains(output.as_str()) => {}
                    Some(_) => {
                        return Err(RunError::validation(format!(
                            "step \"{}\" references non-existent output \"{output}\" on step \"{ref_id}\"",
                            step.id
                        )));
                    }
                    None => {
                        return Err(RunError::validation(format!(
                            "step \"{}\" references step \"{ref_id}\" which has no outputs",
                            step.id
                        )));
                    }
                }
            }

            for name in template::input_refs(candidate) {
                if !plan.inputs.contains_key(&name) {
                    return Err(RunError::validation(format!(
                        "step \"{}\" references unknown input \"{name}\"",
                        step.id
                    )));
                }
            }
        }

        if !step.outputs.is_empty() {
            step_outputs.insert(&step.id, step.outputs.keys().map(String::as_str).collect());
        }
    }

    Ok(())
}

/// All template-bearing strings of a step, for reference extraction.
fn step_strings(step: &Step) -> Vec<&str> {
    let mut strings = Vec::new();
    if let Some(run) = step.run.as_deref() {
        strings.push(run);
    }
    for value in step.params.values() {
        strings.push(value);
    }
    if let Some(http) = &step.http {
        strings.push(&http.url);
        if let Some(body) = http.body.as_deref() {
            strings.push(body);
        }
        for value in http.headers.values() {
            strings.push(value);
        }
    }
    strings
}
