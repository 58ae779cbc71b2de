//! Line-delimited stdio transport.
//!
//! One JSON-RPC request per input line, one response per output line.
//! The protocol stream owns stdout; all logging goes to stderr.

use std::io::{BufRead, Write};
use std::path::Path;

use super::dispatcher::dispatch;
use super::protocol::{JsonRpcRequest, JsonRpcResponse};

/// Serve JSON-RPC over stdin/stdout until EOF.
pub fn serve(work_dir: &Path, plans_dir: Option<&Path>) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve_lines(&mut stdin.lock(), &mut stdout.lock(), work_dir, plans_dir)
}

fn serve_lines<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    work_dir: &Path,
    plans_dir: Option<&Path>,
) -> anyhow::Result<()> {
    // read_line grows the buffer as needed, so oversized requests are
    // handled without an explicit limit.
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(request) => dispatch(&request, work_dir, plans_dir),
            Err(_) => JsonRpcResponse::error(None, -32700, "Parse error"),
        };

        let data = serde_json::to_string(&response)?;
        writeln!(writer, "{data}")?;
        writer.flush()?;
    }
}
