//! The four operations exposed to tool adapters
//!
//! [`DocService`] ties one [`DocumentStore`] to one [`SearchIndex`] and keeps
//! them in step: every successful refresh republishes the catalog and then
//! rebuilds the index from that exact snapshot.

use crate::config::{Config, DEFAULT_MAX_RESULTS};
use crate::error::Result;
use crate::scanner::SkippedFile;
use crate::search::{IndexState, SearchHit, SearchIndex};
use crate::store::{Document, DocumentStore, DocumentSummary};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Statistics from a refresh
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Catalog version now being served
    pub version: u64,
    /// Number of documents cataloged and indexed
    pub files_indexed: usize,
    /// Total size of indexed documents in bytes
    pub total_size: u64,
    /// Distinct terms in the index
    pub terms: usize,
    /// Files left out of the catalog, with reasons
    pub skipped: Vec<SkippedFile>,
    pub duration_ms: u128,
    pub timestamp: DateTime<Utc>,
}

/// Service health snapshot
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub root: String,
    pub state: IndexState,
    pub version: u64,
    pub documents: usize,
    pub total_size: u64,
    pub terms: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Document catalog plus keyword search
pub struct DocService {
    store: DocumentStore,
    index: SearchIndex,
    refresh: Mutex<()>,
}

impl DocService {
    /// Create the service without scanning; the index starts `Empty`
    pub fn new(config: Config) -> Self {
        DocService {
            store: DocumentStore::new(&config.root, config.scan),
            index: SearchIndex::new(config.scoring),
            refresh: Mutex::new(()),
        }
    }

    /// Create the service and run the initial scan and index build
    pub fn open(config: Config) -> Result<(Self, IndexStats)> {
        let service = DocService::new(config);
        let stats = service.refresh_index()?;
        Ok((service, stats))
    }

    /// Convenience wrapper for `open(Config::new(root))`
    pub fn open_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(DocService::open(Config::new(root))?.0)
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Document summaries in path order, optionally under one directory
    pub fn list_docs(&self, directory: Option<&str>) -> Vec<DocumentSummary> {
        self.store.list(directory)
    }

    /// Ranked keyword search; `max_results` defaults to 10
    pub fn search_docs(&self, query: &str, max_results: Option<usize>) -> Result<Vec<SearchHit>> {
        self.index.search(query, max_results.unwrap_or(DEFAULT_MAX_RESULTS))
    }

    /// Full document by path
    pub fn get_doc(&self, path: &str) -> Result<Arc<Document>> {
        self.store.get(path)
    }

    /// Rescan the root, then rebuild the index from the new catalog.
    ///
    /// On failure nothing is republished and the previous catalog and
    /// index keep serving.
    pub fn refresh_index(&self) -> Result<IndexStats> {
        let _guard = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();

        let report = self.store.refresh()?;
        let catalog = self.store.snapshot();
        let index = self.index.build(Arc::clone(&catalog));

        let stats = IndexStats {
            version: catalog.version(),
            files_indexed: catalog.len(),
            total_size: catalog.total_size(),
            terms: index.vocabulary_size(),
            skipped: report.skipped,
            duration_ms: started.elapsed().as_millis(),
            timestamp: Utc::now(),
        };

        tracing::info!(
            "Indexed {} documents ({} terms, {} skipped) in {}ms",
            stats.files_indexed,
            stats.terms,
            stats.skipped.len(),
            stats.duration_ms
        );

        Ok(stats)
    }

    /// Current catalog and index statistics
    pub fn status(&self) -> ServiceStatus {
        let index = self.index.snapshot();
        let catalog = self.store.snapshot();
        ServiceStatus {
            root: self.root().display().to_string(),
            state: index.state(),
            version: catalog.version(),
            documents: catalog.len(),
            total_size: catalog.total_size(),
            terms: index.vocabulary_size(),
            loaded_at: catalog.loaded_at(),
        }
    }
}
