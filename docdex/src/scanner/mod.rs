//! Directory scanner for discovering documents under a root

use crate::config::ScanOptions;
use crate::error::{Error, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};
use walkdir::WalkDir;

/// A document file found by the scanner
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated
    pub relative_path: String,
    /// File modification time
    pub modified: SystemTime,
    /// File size in bytes
    pub size: u64,
}

/// A path that could not be cataloged, with the reason
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Everything a single scan produced
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<ScanResult>,
    pub skipped: Vec<SkippedFile>,
}

/// Common directories that never hold documentation
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "__pycache__",
    "venv",
    "dist",
    "build",
];

/// Scanner for document files under a root directory
pub struct Scanner {
    root: PathBuf,
    extensions: Vec<String>,
    exclude: Vec<Pattern>,
    options: ScanOptions,
}

impl Scanner {
    /// Create a scanner; fails if the root is missing or an exclude glob is invalid
    pub fn new<P: AsRef<Path>>(root: P, options: &ScanOptions) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(Error::root_not_found(&root));
        }

        let exclude = options
            .exclude
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let extensions = options
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();

        Ok(Scanner {
            root,
            extensions,
            exclude,
            options: options.clone(),
        })
    }

    /// Root directory being scanned
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree once.
    ///
    /// Walk errors (unreadable directories, symlink loops) are recorded as
    /// skipped paths. Exceeding the configured timeout aborts the whole scan.
    pub fn scan(&self) -> Result<ScanOutcome> {
        let started = Instant::now();
        let deadline = started + self.options.timeout;
        let mut outcome = ScanOutcome::default();

        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e.path(), e.file_type().is_dir()));

        for entry in walker {
            if Instant::now() >= deadline {
                return Err(Error::Timeout(started.elapsed()));
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| self.relative(p))
                        .unwrap_or_else(|| self.root.display().to_string());
                    tracing::warn!("Skipping {}: {}", path, e);
                    outcome.skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let relative_path = self.relative(entry.path());
            match entry.metadata() {
                Ok(metadata) => outcome.files.push(ScanResult {
                    path: entry.path().to_path_buf(),
                    relative_path,
                    modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    size: metadata.len(),
                }),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", relative_path, e);
                    outcome.skipped.push(SkippedFile {
                        path: relative_path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Path relative to the root with `/` separators
    fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Check if a file has a recognized extension
    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .is_some_and(|e| self.extensions.contains(&e))
    }

    /// Check if a path should be excluded
    fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        // Never exclude the root directory itself
        if path == self.root {
            return false;
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with('.') {
            return true;
        }

        if is_dir && EXCLUDED_DIRS.contains(&name) {
            return true;
        }

        let relative = self.relative(path);
        self.exclude.iter().any(|p| p.matches(&relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scanner_finds_documents() {
        let dir = tempdir().unwrap();
        write(dir.path(), "intro.md", "# Intro");
        write(dir.path(), "notes.txt", "plain");
        write(dir.path(), "guides/setup.MD", "# Setup");
        write(dir.path(), "main.rs", "fn main() {}");

        let scanner = Scanner::new(dir.path(), &ScanOptions::default()).unwrap();
        let outcome = scanner.scan().unwrap();

        let paths: Vec<_> = outcome.files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["guides/setup.MD", "intro.md", "notes.txt"]);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_scanner_skips_hidden_and_vendor_dirs() {
        let dir = tempdir().unwrap();
        write(dir.path(), "keep.md", "# Keep");
        write(dir.path(), ".hidden.md", "# Hidden");
        write(dir.path(), ".git/notes.md", "# Git");
        write(dir.path(), "node_modules/pkg/readme.md", "# Pkg");

        let scanner = Scanner::new(dir.path(), &ScanOptions::default()).unwrap();
        let outcome = scanner.scan().unwrap();

        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].relative_path, "keep.md");
    }

    #[test]
    fn test_scanner_exclude_patterns() {
        let dir = tempdir().unwrap();
        write(dir.path(), "api/v1.md", "# v1");
        write(dir.path(), "drafts/wip.md", "# wip");

        let options = ScanOptions {
            exclude: vec!["drafts".to_string()],
            ..Default::default()
        };
        let scanner = Scanner::new(dir.path(), &options).unwrap();
        let outcome = scanner.scan().unwrap();

        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].relative_path, "api/v1.md");
    }

    #[test]
    fn test_scanner_custom_extensions() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.md", "# a");
        write(dir.path(), "b.rst", "b");

        let options = ScanOptions {
            extensions: vec![".rst".to_string()],
            ..Default::default()
        };
        let scanner = Scanner::new(dir.path(), &options).unwrap();
        let outcome = scanner.scan().unwrap();

        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].relative_path, "b.rst");
    }

    #[test]
    fn test_scanner_missing_root() {
        let dir = tempdir().unwrap();
        let result = Scanner::new(dir.path().join("missing"), &ScanOptions::default());
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_scanner_timeout() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.md", "# a");

        let options = ScanOptions {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        let scanner = Scanner::new(dir.path(), &options).unwrap();
        assert!(matches!(scanner.scan(), Err(Error::Timeout(_))));
    }
}
