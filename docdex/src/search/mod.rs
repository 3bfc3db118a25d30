//! Keyword search over a catalog snapshot
//!
//! [`Index`] is an immutable TF-IDF index built from one [`Catalog`].
//! [`SearchIndex`] holds the currently published index and swaps in a new
//! one on every rebuild.
//!
//! A document's score for a query is
//!
//! ```text
//! coverage * sum over matched terms of (1 + ln tf) * ln(1 + N / df) * boost
//! ```
//!
//! where `tf` is the term's count in the document, `N` the number of
//! documents, `df` the number of documents containing the term, `boost` is
//! [`ScoringConfig::title_boost`] when the term also appears in the title,
//! and `coverage` is the fraction of distinct query terms the document
//! matched.

mod tokenizer;

pub use tokenizer::{Token, Tokenizer, STOP_WORDS};

use crate::config::ScoringConfig;
use crate::error::{Error, Result};
use crate::store::{Catalog, Document};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// A ranked search match
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub path: String,
    pub title: String,
    pub score: f64,
    /// Text around the first match
    pub excerpt: String,
    /// Query terms found in the document
    pub matched_terms: Vec<String>,
}

/// Lifecycle state of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// No catalog has been indexed yet
    Empty,
    Ready,
}

/// Per-document token statistics
#[derive(Debug)]
struct IndexEntry {
    doc: Arc<Document>,
    term_freqs: HashMap<String, u32>,
    /// Byte offset and length of each term's first occurrence
    first_seen: HashMap<String, (usize, usize)>,
    title_terms: HashSet<String>,
}

/// Immutable search index over one catalog snapshot
#[derive(Debug)]
pub struct Index {
    catalog: Option<Arc<Catalog>>,
    entries: Vec<IndexEntry>,
    doc_freqs: HashMap<String, usize>,
    tokenizer: Tokenizer,
    config: ScoringConfig,
}

impl Index {
    /// An index in the `Empty` state
    pub fn empty(config: &ScoringConfig) -> Self {
        Index {
            catalog: None,
            entries: Vec::new(),
            doc_freqs: HashMap::new(),
            tokenizer: Tokenizer::new(config.min_token_len),
            config: config.clone(),
        }
    }

    /// Tokenize every document in `catalog`
    pub fn build(catalog: Arc<Catalog>, config: &ScoringConfig) -> Self {
        let tokenizer = Tokenizer::new(config.min_token_len);
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        let entries: Vec<IndexEntry> = catalog
            .documents()
            .map(|doc| {
                let tokens = tokenizer.tokens(&doc.content);
                let mut term_freqs: HashMap<String, u32> = HashMap::new();
                let mut first_seen = HashMap::new();

                for token in &tokens {
                    *term_freqs.entry(token.term.clone()).or_default() += 1;
                    first_seen
                        .entry(token.term.clone())
                        .or_insert((token.offset, token.len));
                }
                for term in term_freqs.keys() {
                    *doc_freqs.entry(term.clone()).or_default() += 1;
                }

                IndexEntry {
                    doc: Arc::clone(doc),
                    title_terms: tokenizer.unique_terms(&doc.title).into_iter().collect(),
                    term_freqs,
                    first_seen,
                }
            })
            .collect();

        Index {
            catalog: Some(catalog),
            entries,
            doc_freqs,
            tokenizer,
            config: config.clone(),
        }
    }

    pub fn state(&self) -> IndexState {
        if self.catalog.is_some() {
            IndexState::Ready
        } else {
            IndexState::Empty
        }
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct terms across all documents
    pub fn vocabulary_size(&self) -> usize {
        self.doc_freqs.len()
    }

    /// Rank documents against `query`, best first.
    ///
    /// A query with no usable terms yields no hits. `max_results` must be
    /// at least 1.
    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        if max_results == 0 {
            return Err(Error::InvalidArgument(format!(
                "max_results must be greater than 0, got {}",
                max_results
            )));
        }

        let terms = self.tokenizer.unique_terms(query);
        if terms.is_empty() || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let idfs: Vec<Option<f64>> = terms.iter().map(|t| self.idf(t)).collect();

        let mut scored: Vec<(f64, &IndexEntry, Vec<String>)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let mut score = 0.0;
                let mut matched = Vec::new();

                for (term, idf) in terms.iter().zip(&idfs) {
                    let (Some(idf), Some(&tf)) = (idf, entry.term_freqs.get(term)) else {
                        continue;
                    };
                    let boost = if entry.title_terms.contains(term) {
                        self.config.title_boost
                    } else {
                        1.0
                    };
                    score += (1.0 + (tf as f64).ln()) * idf * boost;
                    matched.push(term.clone());
                }

                if matched.is_empty() {
                    return None;
                }
                let coverage = matched.len() as f64 / terms.len() as f64;
                Some((score * coverage, entry, matched))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.doc.path.cmp(&b.1.doc.path)));
        scored.truncate(max_results);

        Ok(scored
            .into_iter()
            .map(|(score, entry, matched)| SearchHit {
                path: entry.doc.path.clone(),
                title: entry.doc.title.clone(),
                score,
                excerpt: self.excerpt(entry, &matched),
                matched_terms: matched,
            })
            .collect())
    }

    /// Inverse document frequency; `None` for terms no document contains
    fn idf(&self, term: &str) -> Option<f64> {
        let df = *self.doc_freqs.get(term)?;
        let n = self.entries.len() as f64;
        Some((1.0 + n / df as f64).ln())
    }

    fn excerpt(&self, entry: &IndexEntry, matched: &[String]) -> String {
        let content = &entry.doc.content;
        let first = matched
            .iter()
            .filter_map(|term| entry.first_seen.get(term))
            .min_by_key(|(offset, _)| *offset);

        match first {
            Some(&(offset, len)) => window(content, offset, len, self.config.excerpt_radius),
            None => first_line(content, self.config.excerpt_radius * 2),
        }
    }
}

/// `radius` characters either side of `content[offset..offset + len]`
fn window(content: &str, offset: usize, len: usize, radius: usize) -> String {
    let start = content[..offset]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(offset);
    let after = offset + len;
    let end = content[after..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| after + i)
        .unwrap_or(content.len());

    let mut excerpt = collapse_whitespace(&content[start..end]);
    if start > 0 {
        excerpt.insert_str(0, "...");
    }
    if end < content.len() {
        excerpt.push_str("...");
    }
    excerpt
}

fn first_line(content: &str, max_chars: usize) -> String {
    let line = content.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.chars().count() > max_chars {
        let cut: String = line.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Holder of the currently published [`Index`]
pub struct SearchIndex {
    current: RwLock<Arc<Index>>,
    rebuild: Mutex<()>,
    config: ScoringConfig,
}

impl SearchIndex {
    /// A search index in the `Empty` state
    pub fn new(config: ScoringConfig) -> Self {
        SearchIndex {
            current: RwLock::new(Arc::new(Index::empty(&config))),
            rebuild: Mutex::new(()),
            config,
        }
    }

    /// The currently published index
    pub fn snapshot(&self) -> Arc<Index> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> IndexState {
        self.snapshot().state()
    }

    /// Index `catalog` and publish the result, replacing any previous index
    pub fn build(&self, catalog: Arc<Catalog>) -> Arc<Index> {
        let _guard = self.rebuild.lock().unwrap_or_else(PoisonError::into_inner);

        let index = Arc::new(Index::build(catalog, &self.config));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&index);

        tracing::debug!(
            "Published index: {} documents, {} terms",
            index.len(),
            index.vocabulary_size()
        );
        index
    }

    /// Search the currently published index
    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.snapshot().search(query, max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn catalog(docs: &[(&str, &str)]) -> Arc<Catalog> {
        Arc::new(Catalog::from_documents(
            "/docs",
            docs.iter().map(|(path, content)| Document::new(*path, *content, Utc::now())),
        ))
    }

    fn paths(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.path.as_str()).collect()
    }

    #[test]
    fn test_rare_frequent_term_ranks_first() {
        let index = Index::build(
            catalog(&[
                ("agents.md", "# Agents\n\nA handoff passes work. Each handoff is logged; handoff ends."),
                ("deploy.md", "# Deploy\n\nDeploy the server."),
                ("intro.md", "# Intro\n\nWelcome to the server docs."),
            ]),
            &ScoringConfig::default(),
        );

        let hits = index.search("handoff", 10).unwrap();
        assert_eq!(paths(&hits), vec!["agents.md"]);
        assert!(hits[0].score > 0.0);
        assert_eq!(hits[0].matched_terms, vec!["handoff"]);
    }

    #[test]
    fn test_more_distinct_terms_rank_higher() {
        let index = Index::build(
            catalog(&[
                ("a.md", "server deploy"),
                ("b.md", "server only"),
                ("c.md", "deploy only"),
            ]),
            &ScoringConfig::default(),
        );

        let hits = index.search("server deploy", 10).unwrap();
        assert_eq!(hits[0].path, "a.md");
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_ties_broken_by_path() {
        let index = Index::build(
            catalog(&[("z.md", "same words"), ("m.md", "same words"), ("a.md", "same words")]),
            &ScoringConfig::default(),
        );

        let hits = index.search("words", 10).unwrap();
        assert_eq!(paths(&hits), vec!["a.md", "m.md", "z.md"]);
        assert_eq!(hits[0].score, hits[2].score);
    }

    #[test]
    fn test_title_boost() {
        let index = Index::build(
            catalog(&[
                ("body.md", "# Overview\n\nrouting is covered here"),
                ("title.md", "# Routing\n\nrouting is covered here"),
            ]),
            &ScoringConfig::default(),
        );

        let hits = index.search("routing", 10).unwrap();
        assert_eq!(hits[0].path, "title.md");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let index = Index::build(catalog(&[("a.md", "content")]), &ScoringConfig::default());
        assert!(index.search("", 10).unwrap().is_empty());
        assert!(index.search("the a of !!", 10).unwrap().is_empty());
    }

    #[test]
    fn test_zero_max_results_rejected() {
        let index = Index::build(catalog(&[("a.md", "content")]), &ScoringConfig::default());
        let err = index.search("content", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("max_results"));
    }

    #[test]
    fn test_truncates_to_max_results() {
        let index = Index::build(
            catalog(&[("a.md", "docs"), ("b.md", "docs"), ("c.md", "docs")]),
            &ScoringConfig::default(),
        );
        assert_eq!(paths(&index.search("docs", 2).unwrap()), vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_empty_index_state() {
        let search = SearchIndex::new(ScoringConfig::default());
        assert_eq!(search.state(), IndexState::Empty);
        assert!(search.search("anything", 5).unwrap().is_empty());

        search.build(catalog(&[("a.md", "anything")]));
        assert_eq!(search.state(), IndexState::Ready);
        assert_eq!(search.search("anything", 5).unwrap().len(), 1);
    }

    #[test]
    fn test_build_is_idempotent() {
        let search = SearchIndex::new(ScoringConfig::default());
        let docs = catalog(&[
            ("a.md", "rust search engine"),
            ("b.md", "search the docs with rust"),
            ("c.md", "engine room"),
        ]);

        search.build(Arc::clone(&docs));
        let first = search.search("rust engine", 10).unwrap();
        search.build(docs);
        let second = search.search("rust engine", 10).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_excerpt_window() {
        let content = format!("{} marker {}", "x ".repeat(50), "y ".repeat(50));
        let index = Index::build(catalog(&[("a.md", content.as_str())]), &ScoringConfig::default());

        let hit = &index.search("marker", 1).unwrap()[0];
        assert!(hit.excerpt.starts_with("..."));
        assert!(hit.excerpt.ends_with("..."));
        assert!(hit.excerpt.contains("marker"));
        assert!(hit.excerpt.chars().count() <= 40 * 2 + "marker".len() + 6);
    }

    #[test]
    fn test_excerpt_uses_earliest_match() {
        let index = Index::build(
            catalog(&[("a.md", "Intro line\n\nlater term beta, then alpha")]),
            &ScoringConfig {
                excerpt_radius: 5,
                ..Default::default()
            },
        );

        let hit = &index.search("alpha beta", 1).unwrap()[0];
        assert!(hit.excerpt.contains("beta"));
        assert!(!hit.excerpt.contains("alpha"));
    }

    #[test]
    fn test_excerpt_short_document_untruncated() {
        let index = Index::build(catalog(&[("a.md", "short\nnote")]), &ScoringConfig::default());
        let hit = &index.search("note", 1).unwrap()[0];
        assert_eq!(hit.excerpt, "short note");
    }

    #[test]
    fn test_first_line_fallback() {
        assert_eq!(first_line("\n\n  # Title  \nbody", 80), "# Title");
        assert_eq!(first_line("abcdef", 3), "abc...");
        assert_eq!(first_line("", 3), "");
    }
}
