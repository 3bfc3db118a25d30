//! Configuration for the document store and search index

use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the document root
pub const DOCS_DIR_ENV: &str = "DOCS_DIR";

/// Extensions recognized as documents when none are configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Default bound on a single directory scan
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of search hits
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Options controlling how a document root is scanned
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// File extensions to include (without the dot, matched case-insensitively)
    pub extensions: Vec<String>,
    /// Glob patterns, relative to the root, to skip
    pub exclude: Vec<String>,
    /// Abandon the scan once this much time has passed
    pub timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            exclude: Vec::new(),
            timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

/// Weights used by the TF-IDF ranking
///
/// These are tuning knobs, not a stable contract: result order may change
/// when they do.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Multiplier for query terms that also appear in the document title
    pub title_boost: f64,
    /// Tokens shorter than this (in characters) are ignored
    pub min_token_len: usize,
    /// Characters of context kept on each side of an excerpt match
    pub excerpt_radius: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            title_boost: 1.5,
            min_token_len: 2,
            excerpt_radius: 40,
        }
    }
}

/// Full service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Document root directory
    pub root: PathBuf,
    pub scan: ScanOptions,
    pub scoring: ScoringConfig,
}

impl Config {
    /// Configuration with defaults for everything but the root
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Config {
            root: root.as_ref().to_path_buf(),
            scan: ScanOptions::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Command-line flags shared by the `docdex` and `docdex-mcp` binaries
#[derive(Args, Debug, Clone, PartialEq)]
pub struct DocsArgs {
    /// Documentation root (default: $DOCS_DIR, /app/docs or ./docs)
    #[arg(long, short = 'd', env = "DOCS_DIR", global = true)]
    pub docs_dir: Option<PathBuf>,

    /// File extensions to index (default: md, markdown, txt)
    #[arg(long = "ext", value_delimiter = ',', global = true)]
    pub extensions: Vec<String>,

    /// Glob patterns to exclude, relative to the root
    #[arg(long, short = 'e', global = true)]
    pub exclude: Vec<String>,

    /// Give up on a directory scan after this many seconds
    #[arg(long, default_value_t = DEFAULT_SCAN_TIMEOUT.as_secs(), global = true)]
    pub scan_timeout_secs: u64,

    /// Score multiplier for query terms found in a title
    #[arg(long, global = true)]
    pub title_boost: Option<f64>,

    /// Ignore tokens shorter than this
    #[arg(long, global = true)]
    pub min_token_len: Option<usize>,
}

impl DocsArgs {
    /// Build a [`Config`], resolving the root with [`default_docs_dir`] when unset
    pub fn config(&self) -> Config {
        let root = self.docs_dir.clone().unwrap_or_else(default_docs_dir);
        let mut config = Config::new(root);

        if !self.extensions.is_empty() {
            config.scan.extensions = self
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect();
        }
        config.scan.exclude = self.exclude.clone();
        config.scan.timeout = Duration::from_secs(self.scan_timeout_secs);

        if let Some(boost) = self.title_boost {
            config.scoring.title_boost = boost;
        }
        if let Some(len) = self.min_token_len {
            config.scoring.min_token_len = len;
        }
        config
    }
}

/// Resolve the document root when none was given explicitly.
///
/// Tries `$DOCS_DIR`, then `/app/docs` (container deployments), then
/// `./docs`, returning the first that exists. Falls back to `$DOCS_DIR` or
/// `./docs` when none do.
pub fn default_docs_dir() -> PathBuf {
    let from_env = std::env::var_os(DOCS_DIR_ENV).map(PathBuf::from);
    let candidates: Vec<PathBuf> = from_env
        .clone()
        .into_iter()
        .chain([PathBuf::from("/app/docs"), PathBuf::from("./docs")])
        .collect();

    first_existing(&candidates).unwrap_or_else(|| from_env.unwrap_or_else(|| PathBuf::from("./docs")))
}

fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_dir()).cloned()
}
