//! DeclarAgent — declarative runbook executor for AI agents.
//!
//! Validate, dry-run, and safely run multi-step YAML workflows, or
//! serve them as JSON-RPC tools.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use declaragent::engine::{self, Mode, RunContext, RunResult};
use declaragent::mcp;
use declaragent::plan::{self, Plan};

/// Declarative runbook executor for AI agents
#[derive(Parser)]
#[command(name = "declaragent")]
#[command(author, version, about)]
#[command(long_about = "DeclarAgent — validate, dry-run, and safely run multi-step YAML workflows.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output raw JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a plan file
    Validate {
        /// Path to the plan YAML file
        file: PathBuf,
    },

    /// Show resolved plan steps without executing
    Explain {
        /// Path to the plan YAML file
        file: PathBuf,

        /// Input values (key=value)
        #[arg(long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,
    },

    /// Show what would be executed without running
    #[command(name = "dry-run")]
    DryRun {
        /// Path to the plan YAML file
        file: PathBuf,

        /// Input values (key=value)
        #[arg(long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,
    },

    /// Execute a plan
    Run {
        /// Path to the plan YAML file
        file: PathBuf,

        /// Input values (key=value)
        #[arg(long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,

        /// Allow destructive steps
        #[arg(long)]
        approve: bool,
    },

    /// Start the JSON-RPC tool server (stdio or SSE transport)
    Mcp {
        /// Directory containing plan YAML files to expose as tools
        #[arg(long)]
        plans: Option<PathBuf>,

        /// Transport mode: stdio or sse
        #[arg(long, default_value = "stdio")]
        transport: String,

        /// Port for the SSE transport
        #[arg(long, default_value_t = 19100)]
        port: u16,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr: stdout belongs to --json output and to the
    // stdio transport's protocol stream.
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Validate { file } => cmd_validate(&file, cli.json),
        Commands::Explain { file, inputs } => cmd_explain(&file, &inputs, cli.json),
        Commands::DryRun { file, inputs } => cmd_dry_run(&file, &inputs, cli.json),
        Commands::Run { file, inputs, approve } => cmd_run(&file, &inputs, approve, cli.json),
        Commands::Mcp { plans, transport, port } => cmd_mcp(plans, &transport, port),
    }
}

/// Validate a plan file.
fn cmd_validate(file: &Path, json: bool) -> Result<()> {
    let plan = plan::load_file(file)?;
    if let Err(err) = plan::validate(&plan, None) {
        if json {
            println!("{}", serde_json::json!({"valid": false, "error": err.to_string()}));
        } else {
            eprintln!("Validation failed: {err}");
            if let Some(hint) = &err.hint {
                eprintln!("Hint: {hint}");
            }
        }
        std::process::exit(1);
    }
    if json {
        println!("{}", serde_json::json!({"valid": true}));
    } else {
        println!("Plan is valid.");
    }
    Ok(())
}

/// Show resolved plan steps without executing.
fn cmd_explain(file: &Path, raw_inputs: &[String], json: bool) -> Result<()> {
    let (plan, result) = simulate(file, raw_inputs, Mode::Explain)?;

    if json {
        println!("{}", serde_json::to_string(&result)?);
        return Ok(());
    }

    println!("Plan: {}", plan.name);
    if let Some(description) = &plan.description {
        println!("  {description}");
    }
    println!();
    for step in &result.steps {
        println!("Step: {}", step.id);
        if !step.description.is_empty() {
            println!("  Description: {}", step.description);
        }
        if !step.command.is_empty() {
            println!("  Command: {}", step.command);
        }
        if !step.dry_run_info.is_empty() {
            println!("  Info: {}", step.dry_run_info);
        }
        println!();
    }
    Ok(())
}

/// Show what would be executed without running.
fn cmd_dry_run(file: &Path, raw_inputs: &[String], json: bool) -> Result<()> {
    let (plan, result) = simulate(file, raw_inputs, Mode::DryRun)?;

    if json {
        println!("{}", serde_json::to_string(&result)?);
        return Ok(());
    }

    println!("Dry-run: {}\n", plan.name);
    for step in &result.steps {
        println!("Step: {} [{}]", step.id, step.status);
        if !step.dry_run_info.is_empty() {
            println!("  {}", step.dry_run_info);
        } else if !step.command.is_empty() {
            println!("  Would run: {}", step.command);
        }
        println!();
    }
    Ok(())
}

/// Execute a plan.
fn cmd_run(file: &Path, raw_inputs: &[String], approve: bool, json: bool) -> Result<()> {
    let plan = plan::load_file(file)?;
    let inputs = gather_inputs(&plan, raw_inputs);
    plan::validate(&plan, Some(&inputs))?;

    let work_dir = std::env::current_dir()?;
    let mut ctx = RunContext::new(work_dir, inputs, approve);
    let result = engine::execute(&plan, &mut ctx, Mode::Run)?;

    if json {
        println!("{}", serde_json::to_string(&result)?);
        return Ok(());
    }

    if result.success {
        println!("Plan {:?} completed successfully.", plan.name);
    } else {
        println!(
            "Plan {:?} failed at step {:?}.",
            plan.name,
            result.failed_step_id.as_deref().unwrap_or_default()
        );
        for err in &result.errors {
            println!("  Error: {}", err.message);
            if let Some(hint) = &err.hint {
                println!("  Hint: {hint}");
            }
        }
    }
    println!("Run ID: {}", result.run_id);
    Ok(())
}

/// Start the JSON-RPC tool server.
fn cmd_mcp(plans: Option<PathBuf>, transport: &str, port: u16) -> Result<()> {
    let work_dir = std::env::current_dir()?;
    match transport {
        "stdio" => mcp::stdio::serve(&work_dir, plans.as_deref()),
        "sse" => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(mcp::sse::serve(port, work_dir, plans))
        }
        other => anyhow::bail!("unknown transport {other:?} (must be stdio or sse)"),
    }
}

/// Load a plan and execute it in a non-Run mode against the cwd.
fn simulate(file: &Path, raw_inputs: &[String], mode: Mode) -> Result<(Plan, RunResult)> {
    let plan = plan::load_file(file)?;
    let inputs = gather_inputs(&plan, raw_inputs);
    plan::validate(&plan, Some(&inputs))?;

    let work_dir = std::env::current_dir()?;
    let mut ctx = RunContext::new(work_dir, inputs, false);
    let result = engine::execute(&plan, &mut ctx, mode)?;
    Ok((plan, result))
}

/// Parse `key=value` pairs and fill in plan defaults.
fn gather_inputs(plan: &Plan, raw: &[String]) -> HashMap<String, String> {
    let mut inputs = parse_inputs(raw);
    for (name, input) in &plan.inputs {
        if !inputs.contains_key(name) && !input.default_value().is_empty() {
            inputs.insert(name.clone(), input.default_value().to_string());
        }
    }
    inputs
}

/// Convert `["key=value", ...]` to a map; malformed entries are dropped.
fn parse_inputs(raw: &[String]) -> HashMap<String, String> {
    raw.iter()
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
