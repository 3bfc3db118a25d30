//! In-memory document store
//!
//! The store owns a [`Catalog`]: an immutable, versioned snapshot of every
//! document under the configured root. Readers clone an `Arc` to the
//! current snapshot; [`DocumentStore::refresh`] builds a complete
//! replacement and publishes it with a single pointer swap, so a reader
//! never sees a half-built catalog.

use crate::config::ScanOptions;
use crate::error::{Error, Result};
use crate::parser::extract_title;
use crate::scanner::{ScanResult, Scanner, SkippedFile};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

/// A single cataloged document
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Path relative to the root, `/`-separated
    pub path: String,
    pub title: String,
    pub content: String,
    /// File size in bytes
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    /// SHA-256 of the raw file bytes, hex encoded
    pub hash: String,
}

impl Document {
    /// Build a document from its parts, deriving title and hash
    pub fn new(path: impl Into<String>, content: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        let path = path.into();
        let content = content.into();
        Document {
            title: extract_title(Path::new(&path), &content),
            size: content.len() as u64,
            hash: calculate_hash(content.as_bytes()),
            path,
            content,
            modified_at,
        }
    }

    /// Listing view of this document
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            path: self.path.clone(),
            title: self.title.clone(),
            size: self.size,
            modified_at: self.modified_at,
            hash: self.hash.clone(),
        }
    }

    /// Lines `from_line..from_line + max_lines` (1-indexed); empty when out of range
    pub fn lines(&self, from_line: Option<usize>, max_lines: Option<usize>) -> String {
        let start = from_line.unwrap_or(1).saturating_sub(1);
        let taken = self.content.lines().skip(start);
        let selected: Vec<&str> = match max_lines {
            Some(limit) => taken.take(limit).collect(),
            None => taken.collect(),
        };
        selected.join("\n")
    }
}

/// Document metadata without content, as returned by listings
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub path: String,
    pub title: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    pub hash: String,
}

/// Immutable snapshot of all documents under a root, ordered by path
#[derive(Debug, Clone)]
pub struct Catalog {
    version: u64,
    root: PathBuf,
    loaded_at: DateTime<Utc>,
    documents: BTreeMap<String, Arc<Document>>,
}

impl Catalog {
    /// An empty catalog (version 0)
    pub fn empty<P: AsRef<Path>>(root: P) -> Self {
        Catalog {
            version: 0,
            root: root.as_ref().to_path_buf(),
            loaded_at: Utc::now(),
            documents: BTreeMap::new(),
        }
    }

    /// Build a catalog from documents; later duplicates of a path replace earlier ones
    pub fn from_documents<P: AsRef<Path>>(root: P, documents: impl IntoIterator<Item = Document>) -> Self {
        let mut catalog = Catalog::empty(root);
        for doc in documents {
            catalog.documents.insert(doc.path.clone(), Arc::new(doc));
        }
        catalog
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Total content size in bytes
    pub fn total_size(&self) -> u64 {
        self.documents.values().map(|d| d.size).sum()
    }

    /// Documents in path order
    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.documents.values()
    }

    /// Exact lookup by (normalized) path
    pub fn get(&self, path: &str) -> Result<Arc<Document>> {
        let key = normalize_path(path);
        self.documents
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| Error::document_not_found(path))
    }

    /// Summaries in path order, optionally limited to one directory subtree
    pub fn list(&self, directory: Option<&str>) -> Vec<DocumentSummary> {
        let prefix = directory.map(normalize_path).unwrap_or_default();
        self.documents
            .values()
            .filter(|doc| in_directory(&doc.path, &prefix))
            .map(|doc| doc.summary())
            .collect()
    }
}

/// Result of scanning and reading a document root
#[derive(Debug)]
pub struct LoadOutcome {
    pub catalog: Catalog,
    pub skipped: Vec<SkippedFile>,
}

/// Scan `root` and read every recognized document into a new catalog.
///
/// Fails only if the root is missing, an exclude pattern is invalid, or the
/// scan times out. Files that cannot be read or are not valid UTF-8 are
/// logged and reported in [`LoadOutcome::skipped`].
pub fn load<P: AsRef<Path>>(root: P, options: &ScanOptions) -> Result<LoadOutcome> {
    let started = Instant::now();
    let scanner = Scanner::new(root.as_ref(), options)?;
    let scan = scanner.scan()?;

    let mut skipped = scan.skipped;
    let mut documents = Vec::with_capacity(scan.files.len());

    for file in scan.files {
        if started.elapsed() >= options.timeout {
            return Err(Error::Timeout(started.elapsed()));
        }
        match read_document(&file) {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", file.relative_path, e);
                skipped.push(SkippedFile {
                    path: file.relative_path,
                    reason: e.to_string(),
                });
            }
        }
    }

    let catalog = Catalog::from_documents(scanner.root(), documents);

    tracing::info!(
        "Loaded {} documents from {} ({} skipped) in {:?}",
        catalog.len(),
        scanner.root().display(),
        skipped.len(),
        started.elapsed()
    );

    Ok(LoadOutcome { catalog, skipped })
}

fn read_document(file: &ScanResult) -> Result<Document> {
    let access = |reason: String| Error::Access {
        path: file.relative_path.clone(),
        reason,
    };

    let bytes = std::fs::read(&file.path).map_err(|e| access(e.to_string()))?;
    let hash = calculate_hash(&bytes);
    let size = bytes.len() as u64;
    let content = String::from_utf8(bytes).map_err(|e| access(format!("not valid UTF-8: {}", e)))?;

    Ok(Document {
        title: extract_title(&file.path, &content),
        path: file.relative_path.clone(),
        content,
        size,
        modified_at: DateTime::<Utc>::from(file.modified),
        hash,
    })
}

/// Outcome of a successful refresh
#[derive(Debug, Clone)]
pub struct RefreshReport {
    /// Version of the newly published catalog
    pub version: u64,
    /// Number of documents in it
    pub documents: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Owner of the current catalog snapshot
pub struct DocumentStore {
    root: PathBuf,
    options: ScanOptions,
    current: RwLock<Arc<Catalog>>,
    rebuild: Mutex<()>,
    next_version: AtomicU64,
}

impl DocumentStore {
    /// Create a store with an empty catalog; call [`refresh`](Self::refresh) to populate it
    pub fn new<P: AsRef<Path>>(root: P, options: ScanOptions) -> Self {
        let root = root.as_ref().to_path_buf();
        DocumentStore {
            current: RwLock::new(Arc::new(Catalog::empty(&root))),
            root,
            options,
            rebuild: Mutex::new(()),
            next_version: AtomicU64::new(1),
        }
    }

    /// Create a store and perform the initial scan
    pub fn open<P: AsRef<Path>>(root: P, options: ScanOptions) -> Result<(Self, RefreshReport)> {
        let store = DocumentStore::new(root, options);
        let report = store.refresh()?;
        Ok((store, report))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The currently published catalog
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Document summaries in path order
    pub fn list(&self, directory: Option<&str>) -> Vec<DocumentSummary> {
        self.snapshot().list(directory)
    }

    /// Exact lookup by path
    pub fn get(&self, path: &str) -> Result<Arc<Document>> {
        self.snapshot().get(path)
    }

    /// Rescan the root and publish the new catalog.
    ///
    /// Concurrent refreshes run one at a time. If the scan fails the
    /// previously published catalog stays in place.
    pub fn refresh(&self) -> Result<RefreshReport> {
        let _guard = self.rebuild.lock().unwrap_or_else(PoisonError::into_inner);

        let LoadOutcome { mut catalog, skipped } = load(&self.root, &self.options)?;
        catalog.version = self.next_version.fetch_add(1, Ordering::SeqCst);

        let report = RefreshReport {
            version: catalog.version,
            documents: catalog.len(),
            skipped,
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(catalog);
        tracing::debug!("Published catalog version {}", report.version);

        Ok(report)
    }
}

/// Strip `./`, leading `/` and trailing `/`, and use `/` separators
pub(crate) fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut path = path.as_str();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    let path = path.trim_matches('/');
    if path == "." {
        String::new()
    } else {
        path.to_string()
    }
}

/// Whether `path` lies under the directory `prefix` (empty means everywhere)
fn in_directory(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Calculate SHA-256 hash of content
fn calculate_hash(content: &[u8]) -> String {
    Sha256::digest(content)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
