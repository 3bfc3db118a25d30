//! docdex CLI - browse, search and serve a documentation folder

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use docdex::mcp::{tools::get_tool_definitions, AnswerArgs, Answerer, McpServer};
use docdex::{Config, DocService, DocsArgs};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docdex")]
#[command(
    author,
    version,
    about = "docdex - keyword search over a folder of documentation"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    docs: DocsArgs,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List documents, optionally under a subdirectory
    List {
        /// Subdirectory relative to the docs root
        #[arg(value_name = "DIR")]
        directory: Option<String>,

        /// Output format
        #[arg(long, short = 'o', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Search documents by keyword
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(long, short = 'n', default_value = "10")]
        limit: usize,

        /// Output format
        #[arg(long, short = 'o', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Get a document by path
    Get {
        /// Document path relative to the docs root
        /// Supports :linenum suffix (e.g., "guides/setup.md:50")
        path: String,

        /// Start from this line number (1-indexed, overrides :linenum suffix)
        #[arg(long)]
        from: Option<usize>,

        /// Maximum number of lines to return
        #[arg(short = 'l', long = "lines")]
        max_lines: Option<usize>,

        /// Add line numbers to output
        #[arg(long)]
        line_numbers: bool,

        /// Output format
        #[arg(long, short = 'o', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Rescan the docs folder and report index statistics
    Index {
        /// Output format
        #[arg(long, short = 'o', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Load the docs folder and print what the MCP server would expose
    Check,

    /// Start MCP server (stdio transport)
    Serve {
        #[command(flatten)]
        answer: AnswerArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output or the MCP protocol
    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => "debug",
        (Commands::Serve { .. }, false) => "error",
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = cli.docs.config();

    match cli.command {
        Commands::List { directory, format } => cmd_list(config, directory.as_deref(), format),
        Commands::Search { query, limit, format } => cmd_search(config, &query, limit, format),
        Commands::Get {
            path,
            from,
            max_lines,
            line_numbers,
            format,
        } => cmd_get(config, &path, from, max_lines, line_numbers, format),
        Commands::Index { format } => cmd_index(config, format),
        Commands::Check => cmd_check(config),
        Commands::Serve { answer } => cmd_serve(config, &answer).await,
    }
}

fn open(config: Config) -> Result<DocService> {
    let root = config.root.clone();
    let (service, stats) = DocService::open(config)?;
    tracing::debug!("Loaded {} documents from {}", stats.files_indexed, root.display());
    Ok(service)
}

/// Format bytes as human-readable size
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}

/// Format a timestamp for list output
/// Shows "Mon DD HH:MM" for recent files, "Mon DD  YYYY" for older
fn format_ls_time(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    use chrono::Local;

    let local = timestamp.with_timezone(&Local);
    let six_months_ago = Local::now() - chrono::Duration::days(180);

    if local > six_months_ago {
        local.format("%b %d %H:%M").to_string()
    } else {
        local.format("%b %d  %Y").to_string()
    }
}

fn cmd_list(config: Config, directory: Option<&str>, format: OutputFormat) -> Result<()> {
    let service = open(config)?;
    let docs = service.list_docs(directory);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }

    if docs.is_empty() {
        match directory {
            Some(dir) => println!("No documents found under: {}", dir),
            None => println!("No documents found in {}", service.root().display()),
        }
        return Ok(());
    }

    let max_size_width = docs
        .iter()
        .map(|d| format_bytes(d.size).len())
        .max()
        .unwrap_or(0);

    for doc in docs {
        println!(
            "{:>width$}  {}  {}  {}",
            format_bytes(doc.size),
            format_ls_time(doc.modified_at),
            doc.path,
            doc.title,
            width = max_size_width
        );
    }
    Ok(())
}

fn cmd_search(config: Config, query: &str, limit: usize, format: OutputFormat) -> Result<()> {
    let service = open(config)?;
    let results = service.search_docs(query, Some(limit))?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results found for '{}'", query);
        return Ok(());
    }

    println!("Found {} results for '{}':\n", results.len(), query);
    for (i, result) in results.iter().enumerate() {
        println!("{}. {} (score: {:.3})", i + 1, result.path, result.score);
        println!("   {}", result.title);
        if !result.excerpt.is_empty() {
            println!("   {}", result.excerpt);
        }
        println!();
    }
    Ok(())
}

fn cmd_get(
    config: Config,
    path: &str,
    from_line: Option<usize>,
    max_lines: Option<usize>,
    line_numbers: bool,
    format: OutputFormat,
) -> Result<()> {
    let service = open(config)?;

    let (clean_path, suffix_line) = docdex::split_line_suffix(path);
    let effective_from = from_line.or(suffix_line);

    let doc = service.get_doc(clean_path)?;
    let mut output = doc.lines(effective_from, max_lines);
    if line_numbers {
        output = docdex::number_lines(&output, effective_from.unwrap_or(1));
    }

    if format == OutputFormat::Json {
        let result = serde_json::json!({
            "path": doc.path,
            "title": doc.title,
            "size": doc.size,
            "modifiedAt": doc.modified_at,
            "hash": doc.hash,
            "fromLine": effective_from,
            "lineCount": output.lines().count(),
            "content": output,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Path: {}", doc.path);
        println!("Title: {}", doc.title);
        if let Some(from) = effective_from {
            println!("From line: {}", from);
        }
        println!("\n{}", output);
    }
    Ok(())
}

fn cmd_index(config: Config, format: OutputFormat) -> Result<()> {
    let service = DocService::new(config);
    let stats = service.refresh_index()?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!(
        "Indexing complete:\n  Root: {}\n  Files indexed: {}\n  Total size: {}\n  Terms: {}\n  Files skipped: {}\n  Duration: {}ms",
        service.root().display(),
        stats.files_indexed,
        format_bytes(stats.total_size),
        stats.terms,
        stats.skipped.len(),
        stats.duration_ms
    );
    for skipped in &stats.skipped {
        println!("    {}: {}", skipped.path, skipped.reason);
    }
    Ok(())
}

fn cmd_check(config: Config) -> Result<()> {
    let service = open(config)?;
    let status = service.status();

    println!("docdex {}", docdex::VERSION);
    println!("==========");
    println!("Docs directory: {}", status.root);
    println!("Documents: {} ({})", status.documents, format_bytes(status.total_size));
    println!("Terms indexed: {}", status.terms);
    println!("\nTools:");
    for tool in get_tool_definitions() {
        println!("  {}", tool.name);
    }
    Ok(())
}

async fn cmd_serve(config: Config, answer: &AnswerArgs) -> Result<()> {
    let root = config.root.clone();
    let service = tokio::task::spawn_blocking(move || DocService::open(config)).await??.0;
    tracing::info!("Serving {} over MCP stdio", root.display());

    let mut server = McpServer::new(Arc::new(service));
    if let Some(answerer) = answer.answerer() {
        tracing::info!("Answering ask_docs with {}", answerer.name());
        server = server.with_answerer(Arc::new(answerer));
    }

    Ok(server.run().await?)
}
