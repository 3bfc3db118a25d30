//! MCP (Model Context Protocol) server for docdex
//!
//! Exposes the document service to AI agents over stdio.
//!
//! ## Tools Exposed
//!
//! - `list_docs` - List documents, optionally under a subdirectory
//! - `search_docs` - TF-IDF keyword search with excerpts
//! - `get_doc` - Retrieve a document, optionally a line range
//! - `refresh_index` - Rescan the docs folder and rebuild the index
//! - `ask_docs` - Gather context for a question and answer it
//!
//! Every document is also a `docs://{path}` resource, and a
//! `documentation_query` prompt is offered.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docdex::mcp::McpServer;
//! use docdex::DocService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> docdex::Result<()> {
//!     let service = DocService::open_dir("./docs")?;
//!     McpServer::new(Arc::new(service)).run().await
//! }
//! ```

pub mod answer;
pub mod prompts;
mod protocol;
mod server;
pub mod tools;

pub use answer::{AnswerArgs, Answerer, AskRequest, CommandAnswerer};
pub use protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, PromptDefinition, PromptMessage, ResourceContents,
    ResourceDefinition, ToolContent, ToolDefinition, ToolResult, MCP_PROTOCOL_VERSION,
};
pub use server::{McpServer, RESOURCE_SCHEME};
