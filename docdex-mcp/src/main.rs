//! docdex MCP Server
//!
//! A Model Context Protocol (MCP) server that exposes a folder of
//! documentation to AI agents over stdio transport.
//!
//! ## Usage
//!
//! ```bash
//! # Serve $DOCS_DIR, /app/docs or ./docs (first that exists)
//! docdex-mcp
//!
//! # Serve a specific folder
//! docdex-mcp --docs-dir /path/to/docs
//!
//! # Answer ask_docs questions with an external model CLI
//! docdex-mcp --answer-command "llm -m gpt-4o-mini"
//!
//! # Give up on an answer after 30 seconds (default 120)
//! docdex-mcp --answer-command "llm" --answer-timeout-secs 30
//!
//! # Enable verbose logging
//! docdex-mcp --verbose
//! ```
//!
//! ## MCP Configuration
//!
//! Add to your MCP client configuration (e.g., Claude Desktop):
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "docs": {
//!       "command": "docdex-mcp",
//!       "args": ["--docs-dir", "/path/to/docs"]
//!     }
//!   }
//! }
//! ```
//!
//! ## Available Tools
//!
//! - **list_docs**: List documents with titles, sizes and timestamps
//! - **search_docs**: Keyword search with relevance ranking and excerpts
//! - **get_doc**: Retrieve a document, optionally a line range
//! - **refresh_index**: Rescan the folder and rebuild the index
//! - **ask_docs**: Gather context for a question and answer it

use anyhow::Result;
use clap::Parser;
use docdex::mcp::{AnswerArgs, Answerer, McpServer};
use docdex::{DocService, DocsArgs};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// docdex MCP Server - Expose documentation search to AI agents via Model Context Protocol
#[derive(Parser, Debug)]
#[command(name = "docdex-mcp")]
#[command(
    author,
    version,
    about = "docdex MCP Server - Model Context Protocol interface for documentation search"
)]
struct Args {
    #[command(flatten)]
    docs: DocsArgs,

    #[command(flatten)]
    answer: AnswerArgs,

    /// Enable verbose logging (outputs to stderr)
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging to stderr (MCP uses stdout for protocol)
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = args.docs.config();
    tracing::info!("Starting docdex MCP server for: {}", config.root.display());

    let (service, stats) = tokio::task::spawn_blocking(move || DocService::open(config)).await??;
    tracing::info!(
        "Loaded {} documents ({} skipped)",
        stats.files_indexed,
        stats.skipped.len()
    );

    let mut server = McpServer::new(Arc::new(service));
    if let Some(answerer) = args.answer.answerer() {
        tracing::info!("Answering ask_docs with {}", answerer.name());
        server = server.with_answerer(Arc::new(answerer));
    }

    server.run().await?;

    Ok(())
}
