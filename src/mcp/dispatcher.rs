//! JSON-RPC method dispatch.
//!
//! A pure function from `(request, workdir, plansdir)` to a response;
//! both transports are thin I/O shells over it. Five built-in plan
//! tools are always exposed, plus one tool per plan file discovered in
//! the plans directory. Discovery happens on every `tools/list` call,
//! so edits to the directory are visible without a restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};

use super::protocol::{
    text_content, CallToolParams, JsonRpcRequest, JsonRpcResponse, RpcError, ToolDef,
    ToolInputSchema,
};
use crate::engine::{self, Mode, RunContext};
use crate::plan::{self, Plan};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "declaragent";

/// Handle one JSON-RPC request.
pub fn dispatch(
    request: &JsonRpcRequest,
    work_dir: &Path,
    plans_dir: Option<&Path>,
) -> JsonRpcResponse {
    let id = request.id.clone();
    let outcome = match request.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
        })),
        "notifications/initialized" | "ping" => Ok(json!({})),
        "tools/list" => {
            let mut tools = builtin_tools();
            tools.extend(plan_tools(plans_dir));
            Ok(json!({"tools": tools}))
        }
        "tools/call" => handle_tool_call(request.params.as_ref(), work_dir, plans_dir),
        _ => Err(RpcError::new(-32601, "Method not found")),
    };

    match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => JsonRpcResponse::from_rpc_error(id, error),
    }
}

/// Arguments accepted by the built-in plan tools.
#[derive(Debug, Default, Deserialize)]
struct BuiltinArgs {
    #[serde(default)]
    file: String,
    #[serde(default)]
    inputs: HashMap<String, String>,
    #[serde(default)]
    approve: bool,
}

fn handle_tool_call(
    params: Option<&Value>,
    work_dir: &Path,
    plans_dir: Option<&Path>,
) -> Result<Value, RpcError> {
    let invalid = || RpcError::new(-32602, "Invalid params");
    let call: CallToolParams = params
        .cloned()
        .map(serde_json::from_value::<CallToolParams>)
        .transpose()
        .map_err(|_| invalid())?
        .ok_or_else(invalid)?;

    // Built-in arguments are parsed best-effort; absent fields default.
    let args: BuiltinArgs = serde_json::from_value(call.arguments.clone()).unwrap_or_default();

    match call.name.as_str() {
        "plan.validate" => Ok(tool_validate(&args.file, work_dir)),
        "plan.explain" => Ok(tool_execute(&args.file, args.inputs, work_dir, Mode::Explain, false)),
        "plan.dry_run" => Ok(tool_execute(&args.file, args.inputs, work_dir, Mode::DryRun, false)),
        "plan.run" => Ok(tool_execute(&args.file, args.inputs, work_dir, Mode::Run, args.approve)),
        "plan.schema" => Ok(text_content(SCHEMA_TEXT)),
        name => call_plan_tool(name, &call.arguments, work_dir, plans_dir),
    }
}

fn tool_validate(file: &str, work_dir: &Path) -> Value {
    let plan = match plan::load_file(&resolve_path(file, work_dir)) {
        Ok(plan) => plan,
        Err(e) => return text_content(e.to_string()),
    };
    match plan::validate(&plan, Some(&HashMap::new())) {
        Ok(()) => text_content("Plan is valid."),
        Err(e) => text_content(format!("Validation failed: {e}")),
    }
}

fn tool_execute(
    file: &str,
    mut inputs: HashMap<String, String>,
    work_dir: &Path,
    mode: Mode,
    approve: bool,
) -> Value {
    let plan = match plan::load_file(&resolve_path(file, work_dir)) {
        Ok(plan) => plan,
        Err(e) => return text_content(e.to_string()),
    };
    apply_defaults(&plan, &mut inputs);
    if let Err(e) = plan::validate(&plan, Some(&inputs)) {
        return text_content(e.to_string());
    }

    let mut ctx = RunContext::new(work_dir, inputs, approve);
    run_to_content(&plan, &mut ctx, mode)
}

fn call_plan_tool(
    name: &str,
    arguments: &Value,
    work_dir: &Path,
    plans_dir: Option<&Path>,
) -> Result<Value, RpcError> {
    let unknown = || RpcError::new(-32602, format!("Unknown tool: {name}"));
    let plans_dir = plans_dir.ok_or_else(unknown)?;
    let plan = find_plan(name, plans_dir).ok_or_else(unknown)?;

    // Plan-as-tool arguments are a flat string map of input values.
    let mut inputs: HashMap<String, String> =
        serde_json::from_value(arguments.clone()).unwrap_or_default();
    apply_defaults(&plan, &mut inputs);
    if let Err(e) = plan::validate(&plan, Some(&inputs)) {
        return Ok(text_content(e.to_string()));
    }

    let mut ctx = RunContext::new(work_dir, inputs, false);
    Ok(run_to_content(&plan, &mut ctx, Mode::Run))
}

fn run_to_content(plan: &Plan, ctx: &mut RunContext, mode: Mode) -> Value {
    match engine::execute(plan, ctx, mode) {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(body) => text_content(body),
            Err(e) => text_content(format!("encoding result: {e}")),
        },
        Err(e) => text_content(format!("{e:#}")),
    }
}

fn apply_defaults(plan: &Plan, inputs: &mut HashMap<String, String>) {
    for (name, input) in &plan.inputs {
        if !inputs.contains_key(name) && !input.default_value().is_empty() {
            inputs.insert(name.clone(), input.default_value().to_string());
        }
    }
}

fn builtin_tools() -> Vec<ToolDef> {
    let file_prop = || ("file".to_string(), json!({"type": "string"}));
    let inputs_prop = || ("inputs".to_string(), json!({"type": "object"}));
    let required_file = || vec!["file".to_string()];

    vec![
        ToolDef {
            name: "plan.validate".to_string(),
            description: "Validate a plan YAML file".to_string(),
            input_schema: ToolInputSchema::object(
                HashMap::from([file_prop()]),
                required_file(),
            ),
        },
        ToolDef {
            name: "plan.explain".to_string(),
            description: "Explain a plan without executing".to_string(),
            input_schema: ToolInputSchema::object(
                HashMap::from([file_prop(), inputs_prop()]),
                required_file(),
            ),
        },
        ToolDef {
            name: "plan.dry_run".to_string(),
            description: "Dry-run a plan".to_string(),
            input_schema: ToolInputSchema::object(
                HashMap::from([file_prop(), inputs_prop()]),
                required_file(),
            ),
        },
        ToolDef {
            name: "plan.run".to_string(),
            description: "Execute a plan".to_string(),
            input_schema: ToolInputSchema::object(
                HashMap::from([
                    file_prop(),
                    inputs_prop(),
                    ("approve".to_string(), json!({"type": "boolean"})),
                ]),
                required_file(),
            ),
        },
        ToolDef {
            name: "plan.schema".to_string(),
            description: "Return the plan YAML schema".to_string(),
            input_schema: ToolInputSchema::object(HashMap::new(), Vec::new()),
        },
    ]
}

/// One tool per plan discovered in the plans directory.
fn plan_tools(plans_dir: Option<&Path>) -> Vec<ToolDef> {
    let Some(dir) = plans_dir else {
        return Vec::new();
    };
    plan::discover_plans(dir).into_iter().map(|(_, plan)| plan_to_tool(&plan)).collect()
}

fn plan_to_tool(plan: &Plan) -> ToolDef {
    let mut properties = HashMap::new();
    let mut required = Vec::new();

    for (name, input) in &plan.inputs {
        let mut prop = json!({"type": "string"});
        if let Some(description) = &input.description {
            prop["description"] = json!(description);
        }
        if !input.default_value().is_empty() {
            prop["default"] = json!(input.default_value());
        }
        properties.insert(name.clone(), prop);
        // A defaulted input never has to be supplied, so it is not
        // advertised as required.
        if input.required && input.default_value().is_empty() {
            required.push(name.clone());
        }
    }
    required.sort();

    let description = match &plan.description {
        Some(d) if !d.is_empty() => d.clone(),
        _ => format!("Execute the {} plan", plan.name),
    };

    ToolDef {
        name: plan.name.clone(),
        description,
        input_schema: ToolInputSchema::object(properties, required),
    }
}

fn find_plan(name: &str, plans_dir: &Path) -> Option<Plan> {
    plan::discover_plans(plans_dir).into_iter().map(|(_, p)| p).find(|p| p.name == name)
}

fn resolve_path(file: &str, work_dir: &Path) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        work_dir.join(path)
    }
}

const SCHEMA_TEXT: &str = r#"Plan YAML Schema:
  name: string (required)
  description: string (optional)
  inputs:
    <name>:
      required: bool
      description: string
      default: string
  steps:
    - id: string (required, unique)
      name: string (human-readable step label)
      run: string (shell command)
      action: string (built-in action name)
      with: map[string]string (for actions)
      http:
        url: string (required)
        method: string (default: GET)
        headers: map[string]string
        body: string (template-resolved)
      outputs:
        <name>: stdout
      destructive: bool
  Note: Each step must have exactly one of: run, action, or http"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::RequestId;

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(1, method, params)
    }

    fn call(name: &str, arguments: Value) -> JsonRpcRequest {
        request("tools/call", Some(json!({"name": name, "arguments": arguments})))
    }

    fn content_text(response: &JsonRpcResponse) -> String {
        response.result.as_ref().unwrap()["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_initialize() {
        let resp = dispatch(&request("initialize", None), Path::new("/tmp"), None);
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "declaragent");
        assert_eq!(resp.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn test_ping_and_initialized_are_empty_success() {
        for method in ["ping", "notifications/initialized"] {
            let resp = dispatch(&request(method, None), Path::new("/tmp"), None);
            assert!(resp.is_success());
            assert_eq!(resp.result, Some(json!({})));
        }
    }

    #[test]
    fn test_unknown_method() {
        let resp = dispatch(&request("resources/list", None), Path::new("/tmp"), None);
        let error = resp.error.unwrap();
        assert_eq!(error.code, -32601);
    }

    #[test]
    fn test_tools_list_has_builtins() {
        let resp = dispatch(&request("tools/list", None), Path::new("/tmp"), None);
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        for builtin in ["plan.validate", "plan.explain", "plan.dry_run", "plan.run", "plan.schema"]
        {
            assert!(names.contains(&builtin), "missing {builtin}");
        }
        let run_tool = tools.iter().find(|t| t["name"] == "plan.run").unwrap();
        assert_eq!(run_tool["inputSchema"]["type"], "object");
        assert_eq!(run_tool["inputSchema"]["required"][0], "file");
    }

    #[test]
    fn test_tools_list_includes_discovered_plans() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("greet.yaml"),
            concat!(
                "name: greet\n",
                "description: A greeting plan\n",
                "inputs:\n",
                "  who:\n",
                "    required: true\n",
                "steps:\n",
                "  - id: s1\n",
                "    run: echo \"Hello ${{inputs.who}}\"\n",
            ),
        )
        .unwrap();

        let resp =
            dispatch(&request("tools/list", None), Path::new("/tmp"), Some(dir.path()));
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        let greet = tools.iter().find(|t| t["name"] == "greet").expect("greet tool listed");
        assert_eq!(greet["description"], "A greeting plan");
        assert_eq!(greet["inputSchema"]["properties"]["who"]["type"], "string");
        assert_eq!(greet["inputSchema"]["required"], json!(["who"]));
    }

    #[test]
    fn test_plan_tool_schema_defaults_and_description() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("nodesc.yaml"),
            concat!(
                "name: nodesc\n",
                "inputs:\n",
                "  env:\n",
                "    default: staging\n",
                "    description: Target environment\n",
                "  region:\n",
                "    required: true\n",
                "    default: us-east-1\n",
                "steps:\n",
                "  - id: s1\n",
                "    run: echo hi\n",
            ),
        )
        .unwrap();

        let resp =
            dispatch(&request("tools/list", None), Path::new("/tmp"), Some(dir.path()));
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        let tool = tools.iter().find(|t| t["name"] == "nodesc").unwrap();
        assert_eq!(tool["description"], "Execute the nodesc plan");
        let prop = &tool["inputSchema"]["properties"]["env"];
        assert_eq!(prop["default"], "staging");
        assert_eq!(prop["description"], "Target environment");
        // Defaulted inputs are never advertised as required, even when
        // flagged required: the default always satisfies them.
        assert!(tool["inputSchema"].get("required").is_none());
    }

    #[test]
    fn test_tool_call_validate() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plan.yaml");
        std::fs::write(&file, "name: test\nsteps:\n  - id: s1\n    run: echo hello\n").unwrap();

        let resp = dispatch(
            &call("plan.validate", json!({"file": file.to_str().unwrap()})),
            dir.path(),
            None,
        );
        assert!(content_text(&resp).contains("Plan is valid"));
    }

    #[test]
    fn test_tool_call_validate_reports_errors_as_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.yaml");
        std::fs::write(&file, "name: bad\nsteps:\n  - id: s1\n").unwrap();

        let resp = dispatch(&call("plan.validate", json!({"file": "bad.yaml"})), dir.path(), None);
        assert!(resp.is_success());
        assert!(content_text(&resp).contains("Validation failed"));
    }

    #[test]
    fn test_tool_call_run_executes_plan() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("plan.yaml"),
            "name: t\nsteps:\n  - id: s1\n    run: echo from-tool\n",
        )
        .unwrap();

        let resp = dispatch(&call("plan.run", json!({"file": "plan.yaml"})), dir.path(), None);
        let text = content_text(&resp);
        assert!(text.contains("\"success\": true"));
        assert!(text.contains("from-tool"));
    }

    #[test]
    fn test_tool_call_unknown_tool() {
        let resp = dispatch(&call("no.such.tool", json!({})), Path::new("/tmp"), None);
        let error = resp.error.unwrap();
        assert_eq!(error.code, -32602);
        assert!(error.message.contains("Unknown tool"));
    }

    #[test]
    fn test_plan_as_tool_call() {
        let dir = tempfile::tempdir().unwrap();
        let plans = tempfile::tempdir().unwrap();
        std::fs::write(
            plans.path().join("greet.yaml"),
            concat!(
                "name: greet\n",
                "description: A greeting plan\n",
                "inputs:\n",
                "  who:\n",
                "    required: true\n",
                "steps:\n",
                "  - id: s1\n",
                "    run: echo \"Hello ${{inputs.who}}\"\n",
            ),
        )
        .unwrap();

        let resp = dispatch(
            &call("greet", json!({"who": "World"})),
            dir.path(),
            Some(plans.path()),
        );
        assert!(resp.is_success());
        assert!(content_text(&resp).contains("Hello World"));
    }

    #[test]
    fn test_plan_as_tool_missing_required_input() {
        let dir = tempfile::tempdir().unwrap();
        let plans = tempfile::tempdir().unwrap();
        std::fs::write(
            plans.path().join("greet.yaml"),
            concat!(
                "name: greet\n",
                "inputs:\n",
                "  who:\n",
                "    required: true\n",
                "steps:\n",
                "  - id: s1\n",
                "    run: echo \"Hello ${{inputs.who}}\"\n",
            ),
        )
        .unwrap();

        let resp = dispatch(&call("greet", json!({})), dir.path(), Some(plans.path()));
        assert!(resp.is_success());
        assert!(content_text(&resp).contains("missing required input"));
    }

    #[test]
    fn test_plan_schema_tool() {
        let resp = dispatch(&call("plan.schema", json!({})), Path::new("/tmp"), None);
        assert!(content_text(&resp).contains("Plan YAML Schema"));
    }

    #[test]
    fn test_invalid_tools_call_params() {
        let resp = dispatch(
            &request("tools/call", Some(json!("not an object"))),
            Path::new("/tmp"),
            None,
        );
        assert_eq!(resp.error.unwrap().code, -32602);
    }
}
