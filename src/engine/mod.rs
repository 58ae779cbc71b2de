//! Sequential plan execution engine.
//!
//! Iterates steps in file order with fail-fast semantics: templates
//! are resolved against the run context, the mode decides simulation
//! versus execution, destructive steps are gated on approval, and
//! captured outputs feed later steps. Step-level failures are reported
//! inside the [`RunResult`]; only internal impossibilities (a template
//! the validator blessed failing to resolve, artifact-dir creation)
//! surface as the error return.

mod context;
mod result;

pub use context::RunContext;
pub use result::{RunResult, StepResult, StepStatus};

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::action;
use crate::artifact::Store;
use crate::error::RunError;
use crate::plan::{HttpRequest, Plan, Step, StepKind};
use crate::runner;
use crate::template;

/// Execution behavior selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Show resolved commands; no side effects, no artifacts
    Explain,
    /// Describe what each step would do; no side effects
    DryRun,
    /// Real execution with artifact persistence
    Run,
}

/// Execute a plan in the given mode.
pub fn execute(plan: &Plan, ctx: &mut RunContext, mode: Mode) -> anyhow::Result<RunResult> {
    let mut result = RunResult {
        run_id: ctx.run_id.clone(),
        success: true,
        failed_step_id: None,
        steps: Vec::new(),
        artifacts: Vec::new(),
        errors: Vec::new(),
    };

    let store = if mode == Mode::Run {
        let store = Store::new(&ctx.run_id, &ctx.work_dir).context("creating artifact store")?;
        result.artifacts.push(store.base_dir.display().to_string());
        Some(store)
    } else {
        None
    };

    let mut failed = false;
    for step in &plan.steps {
        if failed {
            result.steps.push(StepResult::skipped(&step.id));
            continue;
        }

        let step_result = execute_step(step, ctx, mode)?;

        if step_result.status.is_terminal_failure() {
            result.success = false;
            result.failed_step_id = Some(step.id.clone());
            failed = true;
            result.errors.push(failure_error(step, &step_result));
        }

        if let Some(store) = &store {
            if step_result.status == StepStatus::Success {
                if let Err(e) =
                    store.write_step_output(&step.id, &step_result.stdout_ref, &step_result.stderr_ref)
                {
                    tracing::warn!(step = %step.id, error = %e, "Failed to persist step output");
                }
            }
        }

        result.steps.push(step_result);
    }

    if let Some(store) = &store {
        if let Err(e) = store.write_result(&result) {
            tracing::warn!(run_id = %result.run_id, error = %e, "Failed to persist result");
        }
    }

    Ok(result)
}

fn failure_error(step: &Step, step_result: &StepResult) -> RunError {
    if step_result.status == StepStatus::Blocked {
        return RunError::side_effect_blocked(
            &step.id,
            format!("step \"{}\" is destructive and approval was not given", step.id),
            "Re-run with --approve to allow destructive steps",
        );
    }
    let message = match step_result.exit_code {
        Some(code) => format!("step \"{}\" failed with exit code {code}", step.id),
        None => format!("step \"{}\" failed: {}", step.id, step_result.stderr_ref),
    };
    RunError::step_failed(&step.id, message, format!("Check {} for details", step_result.stderr_ref))
}

fn execute_step(step: &Step, ctx: &mut RunContext, mode: Mode) -> anyhow::Result<StepResult> {
    let mut step_result = StepResult::with_status(&step.id, StepStatus::Skipped);
    step_result.description = step.description.clone().unwrap_or_default();

    match step.kind() {
        Some(StepKind::Run) => {
            let command = step.run.as_deref().unwrap_or_default();
            execute_shell_step(step, command, ctx, mode, step_result)
        }
        Some(StepKind::Http) => {
            // kind() == Http implies the field is present
            let Some(http) = step.http.as_ref() else {
                anyhow::bail!("step {:?} lost its http request", step.id);
            };
            execute_http_step(step, http, ctx, mode, step_result)
        }
        Some(StepKind::Action) => {
            let name = step.action.as_deref().unwrap_or_default();
            execute_action_step(step, name, ctx, mode, step_result)
        }
        None => anyhow::bail!("step {:?} has no runnable shape", step.id),
    }
}

fn execute_shell_step(
    step: &Step,
    command: &str,
    ctx: &mut RunContext,
    mode: Mode,
    mut step_result: StepResult,
) -> anyhow::Result<StepResult> {
    let resolved = template::resolve(command, &ctx.tmpl)
        .with_context(|| format!("resolving template for step {:?}", step.id))?;
    step_result.command = resolved.clone();

    if mode == Mode::Explain {
        step_result.status = StepStatus::Explain;
        register_placeholder_outputs(step, ctx);
        return Ok(step_result);
    }

    if step.destructive && !ctx.approve {
        step_result.status = StepStatus::Blocked;
        register_placeholder_outputs(step, ctx);
        return Ok(step_result);
    }

    if mode == Mode::DryRun {
        step_result.status = StepStatus::DryRun;
        step_result.dry_run_info = format!("Would run: {resolved}");
        register_placeholder_outputs(step, ctx);
        return Ok(step_result);
    }

    tracing::debug!(step = %step.id, command = %resolved, "Executing shell step");
    let start = Instant::now();
    let shell = runner::run(&resolved, &ctx.work_dir);
    step_result.duration = format_duration(start.elapsed());
    step_result.exit_code = Some(shell.exit_code);
    let shell_success = shell.success();
    step_result.stdout_ref = shell.stdout;
    step_result.stderr_ref = shell.stderr;

    if !shell_success {
        step_result.status = StepStatus::Failed;
        return Ok(step_result);
    }

    step_result.status = StepStatus::Success;
    for (name, source) in &step.outputs {
        if source == "stdout" {
            ctx.tmpl.insert_output(&step.id, name, step_result.stdout_ref.trim().to_string());
        }
    }

    Ok(step_result)
}

fn execute_http_step(
    step: &Step,
    http: &HttpRequest,
    ctx: &mut RunContext,
    mode: Mode,
    mut step_result: StepResult,
) -> anyhow::Result<StepResult> {
    let url = template::resolve(&http.url, &ctx.tmpl)
        .with_context(|| format!("resolving url for step {:?}", step.id))?;
    let method = http.method_or_default();
    step_result.command = format!("{method} {url}");

    if mode == Mode::Explain {
        step_result.status = StepStatus::Explain;
        register_placeholder_outputs(step, ctx);
        return Ok(step_result);
    }

    if step.destructive && !ctx.approve {
        step_result.status = StepStatus::Blocked;
        register_placeholder_outputs(step, ctx);
        return Ok(step_result);
    }

    if mode == Mode::DryRun {
        step_result.status = StepStatus::DryRun;
        step_result.dry_run_info = format!("Would send {method} to {url}");
        register_placeholder_outputs(step, ctx);
        return Ok(step_result);
    }

    let mut params = HashMap::new();
    params.insert("url".to_string(), url);
    params.insert("method".to_string(), method.to_string());
    if let Some(body) = http.body.as_deref() {
        if !body.is_empty() {
            let resolved = template::resolve(body, &ctx.tmpl)
                .with_context(|| format!("resolving body for step {:?}", step.id))?;
            params.insert("body".to_string(), resolved);
        }
    }
    for (name, value) in &http.headers {
        let resolved = template::resolve(value, &ctx.tmpl)
            .with_context(|| format!("resolving header {name:?} for step {:?}", step.id))?;
        params.insert(format!("header_{name}"), resolved);
    }

    let Some(act) = action::get("http") else {
        anyhow::bail!("http action not registered");
    };

    let start = Instant::now();
    match act.execute(&params) {
        Ok(outputs) => {
            step_result.duration = format_duration(start.elapsed());
            step_result.status = StepStatus::Success;
            step_result.stdout_ref = outputs.get("stdout").cloned().unwrap_or_default();
            for (name, source) in &step.outputs {
                if let Some(value) = outputs.get(source) {
                    ctx.tmpl.insert_output(&step.id, name, value.trim().to_string());
                }
            }
        }
        Err(e) => {
            step_result.duration = format_duration(start.elapsed());
            step_result.status = StepStatus::Failed;
            step_result.stderr_ref = format!("{e:#}");
        }
    }

    Ok(step_result)
}

fn execute_action_step(
    step: &Step,
    name: &str,
    ctx: &mut RunContext,
    mode: Mode,
    mut step_result: StepResult,
) -> anyhow::Result<StepResult> {
    let Some(act) = action::get(name) else {
        // The validator rejects unknown actions before execution.
        return Err(RunError::tool_not_found(format!("unknown action {name:?}"))
            .with_step(&step.id)
            .into());
    };

    let mut params = HashMap::new();
    for (key, value) in &step.params {
        let mut resolved = template::resolve(value, &ctx.tmpl)
            .with_context(|| format!("resolving param {key:?} for step {:?}", step.id))?;
        // Convenience: relative file params are rooted at the workdir.
        if (key == "path" || key == "file") && !Path::new(&resolved).is_absolute() {
            resolved = ctx.work_dir.join(&resolved).to_string_lossy().into_owned();
        }
        params.insert(key.clone(), resolved);
    }

    if mode == Mode::Explain {
        step_result.status = StepStatus::Explain;
        step_result.command = format!("action: {name}");
        step_result.dry_run_info = act.dry_run(&params);
        register_placeholder_outputs(step, ctx);
        return Ok(step_result);
    }

    if step.destructive && !ctx.approve {
        step_result.status = StepStatus::Blocked;
        register_placeholder_outputs(step, ctx);
        return Ok(step_result);
    }

    if mode == Mode::DryRun {
        step_result.status = StepStatus::DryRun;
        step_result.dry_run_info = act.dry_run(&params);
        register_placeholder_outputs(step, ctx);
        return Ok(step_result);
    }

    tracing::debug!(step = %step.id, action = %name, "Executing action step");
    let start = Instant::now();
    match act.execute(&params) {
        Ok(outputs) => {
            step_result.duration = format_duration(start.elapsed());
            step_result.status = StepStatus::Success;
            // Action outputs are copied verbatim, without trimming.
            for (output_name, source) in &step.outputs {
                if let Some(value) = outputs.get(source) {
                    ctx.tmpl.insert_output(&step.id, output_name, value.clone());
                }
            }
        }
        Err(e) => {
            step_result.duration = format_duration(start.elapsed());
            step_result.status = StepStatus::Failed;
            step_result.stderr_ref = format!("{e:#}");
        }
    }

    Ok(step_result)
}

/// Register placeholder outputs so later steps resolve in non-Run modes.
fn register_placeholder_outputs(step: &Step, ctx: &mut RunContext) {
    for (name, source) in &step.outputs {
        ctx.tmpl.insert_output(&step.id, name, format!("<{}.{}>", step.id, source));
    }
}

fn format_duration(elapsed: Duration) -> String {
    format!("{}ms", elapsed.as_millis())
}
