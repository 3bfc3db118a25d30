//! # docdex - serve a folder of documents to AI agents
//!
//! docdex loads the markdown and text files under a directory into an
//! in-memory catalog and answers keyword queries against it.
//!
//! docdex provides:
//! - **Document store**: versioned, immutable catalog snapshots with atomic refresh
//! - **TF-IDF search** with deterministic ranking and match excerpts
//! - **MCP server** exposing `list_docs`, `search_docs`, `get_doc`,
//!   `refresh_index` and `ask_docs` to AI agents over stdio
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docdex::{Config, DocService};
//!
//! let (service, stats) = DocService::open(Config::new("./docs")).unwrap();
//! println!("indexed {} documents", stats.files_indexed);
//!
//! for hit in service.search_docs("agent handoff", Some(5)).unwrap() {
//!     println!("{:.3}  {}  {}", hit.score, hit.path, hit.excerpt);
//! }
//! ```

pub mod config;
pub mod error;
pub mod mcp;
pub mod parser;
pub mod scanner;
pub mod search;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use config::{default_docs_dir, Config, DocsArgs, ScanOptions, ScoringConfig};
pub use error::{Error, ErrorKind, Result};
pub use search::{Index, IndexState, SearchHit, SearchIndex};
pub use service::{DocService, IndexStats, ServiceStatus};
pub use store::{Catalog, Document, DocumentStore, DocumentSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Split a trailing `:linenum` off a document path.
///
/// # Examples
/// ```
/// use docdex::split_line_suffix;
///
/// assert_eq!(split_line_suffix("guides/setup.md:12"), ("guides/setup.md", Some(12)));
/// assert_eq!(split_line_suffix("notes/10:30.md"), ("notes/10:30.md", None));
/// ```
pub fn split_line_suffix(input: &str) -> (&str, Option<usize>) {
    match input.rsplit_once(':') {
        Some((path, digits)) if !path.is_empty() && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            match digits.parse() {
                Ok(line) => (path, Some(line)),
                Err(_) => (input, None),
            }
        }
        _ => (input, None),
    }
}

/// Prefix each line with its number, starting at `first`.
///
/// # Examples
/// ```
/// assert_eq!(docdex::number_lines("a\nb", 7), "7: a\n8: b");
/// ```
pub fn number_lines(text: &str, first: usize) -> String {
    text.lines()
        .zip(first..)
        .map(|(line, n)| format!("{}: {}", n, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_line_suffix() {
        assert_eq!(split_line_suffix("a.md:5"), ("a.md", Some(5)));
        assert_eq!(split_line_suffix("a.md"), ("a.md", None));
        assert_eq!(split_line_suffix("a.md:"), ("a.md:", None));
        assert_eq!(split_line_suffix(":5"), (":5", None));
        assert_eq!(split_line_suffix("a.md:99999999999999999999999"), ("a.md:99999999999999999999999", None));
    }

    #[test]
    fn test_number_lines() {
        assert_eq!(number_lines("first\nsecond", 1), "1: first\n2: second");
        assert_eq!(number_lines("", 3), "");
    }
}
