//! JSON-RPC 2.0 tool server.
//!
//! Exposes plan operations as tools for LLM hosts: five built-ins
//! (`plan.validate`, `plan.explain`, `plan.dry_run`, `plan.run`,
//! `plan.schema`) plus one tool per plan file in a configured plans
//! directory. The dispatcher is a pure function; the stdio and SSE
//! transports are thin I/O shells over it.

mod dispatcher;
mod protocol;
pub mod sse;
pub mod stdio;

pub use dispatcher::dispatch;
pub use protocol::{
    text_content, CallToolParams, JsonRpcRequest, JsonRpcResponse, RequestId, RpcError, ToolDef,
    ToolInputSchema,
};
