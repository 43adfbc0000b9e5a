//! Query engine: the caller-facing glossary API.
//!
//! Writes go to the [`Database`] and then drop the cached [`SearchIndex`].
//! The index is rebuilt on the next text query, never eagerly after a write.
//! Queries combine the exact tag filter from the store with fuzzy text
//! relevance from the index.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use term_suggester_types::{RpcResponse, TermCandidate};

use crate::config::Config;
use crate::db::Database;
use crate::error::{GlossaryError, Result};
use crate::models::{Tag, Term, TermInput};
use crate::search::config::MAX_QUERY_LENGTH;
use crate::search::{Analyzer, ReadingDictionary, SearchIndex, Tokenizer};

/// Result of [`Glossary::query`]
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub terms: Vec<Term>,
    /// Set when the text part of the query could not run and only the tag
    /// filter was applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

/// Candidate files hold either a bare list or the suggester's response envelope
#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateFile {
    List(Vec<TermCandidate>),
    Response(RpcResponse<Vec<TermCandidate>>),
}

/// Parse a candidate file: a JSON array of candidates, or a suggester
/// `RpcResponse` carrying one. A failed response is reported as an error.
pub fn parse_candidates(raw: &str) -> Result<Vec<TermCandidate>> {
    let file: CandidateFile =
        serde_json::from_str(raw).map_err(|e| GlossaryError::Import(e.to_string()))?;
    match file {
        CandidateFile::List(candidates) => Ok(candidates),
        CandidateFile::Response(response) if response.success => response
            .data
            .ok_or_else(|| GlossaryError::Import("suggester response without data".to_string())),
        CandidateFile::Response(response) => Err(GlossaryError::Import(format!(
            "suggester reported failure: {}",
            response.error.unwrap_or_else(|| "no reason given".to_string())
        ))),
    }
}

pub struct Glossary {
    db: Database,
    analyzer: Arc<Analyzer>,
    threshold: f64,
    index: Mutex<Option<Arc<SearchIndex>>>,
}

impl Glossary {
    pub fn new(db: Database, analyzer: Arc<Analyzer>, threshold: f64) -> Self {
        Self {
            db,
            analyzer,
            threshold,
            index: Mutex::new(None),
        }
    }

    /// Open the configured database folder and load the configured tokenizer
    pub fn from_config(config: &Config) -> Result<Self> {
        let db = Database::open_folder(&config.database_folder)?;

        let mut tokenizer = Tokenizer::new(config.tokenizer)?;
        if let Some(path) = &config.readings_path {
            let readings = ReadingDictionary::load(path)?;
            log::info!(
                "[GLOSSARY] Loaded {} reading(s) from {}",
                readings.len(),
                path.display()
            );
            tokenizer = tokenizer.with_readings(readings);
        }
        log::info!("[GLOSSARY] Using {} tokenizer", config.tokenizer);

        Ok(Self::new(
            db,
            Arc::new(Analyzer::ready(tokenizer)),
            config.search_threshold,
        ))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn analyzer(&self) -> &Arc<Analyzer> {
        &self.analyzer
    }

    /// Whether a built index is currently cached
    pub fn index_is_built(&self) -> bool {
        self.index.lock().is_some()
    }

    fn invalidate(&self) {
        if self.index.lock().take().is_some() {
            log::debug!("[GLOSSARY] Search index invalidated");
        }
    }

    /// Cached index, rebuilt from the store if a write dropped it
    fn search_index(&self) -> Result<Arc<SearchIndex>> {
        let mut cached = self.index.lock();
        if let Some(index) = cached.as_ref() {
            return Ok(Arc::clone(index));
        }
        let terms = self.db.get_all_terms()?;
        let index = Arc::new(SearchIndex::build(terms, &self.analyzer, self.threshold)?);
        *cached = Some(Arc::clone(&index));
        Ok(index)
    }

    // =====================================================
    // Writes
    // =====================================================

    pub fn add_term(&self, input: &TermInput) -> Result<i64> {
        let id = self.db.create_term(input)?;
        self.invalidate();
        Ok(id)
    }

    /// Add suggester candidates through the normal validation path, one
    /// transaction each. Stops at the first invalid candidate.
    pub fn add_candidates(&self, candidates: &[TermCandidate]) -> Result<Vec<i64>> {
        let inputs: Vec<TermInput> = candidates.iter().cloned().map(TermInput::from).collect();
        let result = self.db.create_terms(&inputs);
        // Earlier candidates may have committed even if a later one failed
        self.invalidate();
        result
    }

    pub fn update_term(&self, id: i64, input: &TermInput) -> Result<()> {
        self.db.update_term(id, input)?;
        self.invalidate();
        Ok(())
    }

    pub fn delete_term(&self, id: i64) -> Result<()> {
        self.db.delete_term(id)?;
        self.invalidate();
        Ok(())
    }

    pub fn attach_tag(&self, term_id: i64, name: &str) -> Result<Tag> {
        let tag = self.db.attach_tag(term_id, name)?;
        self.invalidate();
        Ok(tag)
    }

    pub fn detach_tag(&self, term_id: i64, tag_id: i64) -> Result<bool> {
        let removed = self.db.detach_tag(term_id, tag_id)?;
        self.invalidate();
        Ok(removed)
    }

    /// Point the glossary at another database folder (created if absent)
    pub fn switch_database(&mut self, folder: &Path) -> Result<()> {
        let db = Database::open_folder(folder)?;
        self.db = db;
        self.invalidate();
        log::info!("[GLOSSARY] Switched database to {}", folder.display());
        Ok(())
    }

    // =====================================================
    // Reads
    // =====================================================

    pub fn list_terms(&self) -> Result<Vec<Term>> {
        self.db.get_all_terms()
    }

    pub fn get_term(&self, id: i64) -> Result<Term> {
        self.db.get_term(id)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        self.db.get_all_tags()
    }

    pub fn tags_for_term(&self, id: i64) -> Result<Vec<Tag>> {
        self.db.get_tags_for_term(id)
    }

    pub fn search_by_tag(&self, fragment: &str) -> Result<Vec<Term>> {
        self.db.search_by_tag(fragment)
    }

    pub fn term_count(&self) -> Result<usize> {
        self.db.term_count()
    }

    pub fn tag_count(&self) -> Result<usize> {
        self.db.tag_count()
    }

    /// Terms matching `text_query` (fuzzy) and carrying any of `tag_names`.
    ///
    /// Without a text query the tag-filtered list comes back in text order.
    /// With one, text relevance order is kept and tag filtering only removes
    /// entries. If the index cannot be built because tokenization failed,
    /// the tag-filtered list is returned with `degraded` set.
    pub fn query(&self, text_query: &str, tag_names: &[String]) -> Result<QueryResult> {
        if text_query.chars().count() > MAX_QUERY_LENGTH {
            return Err(GlossaryError::validation(format!(
                "query exceeds {} characters",
                MAX_QUERY_LENGTH
            )));
        }

        let has_text = !text_query.trim().is_empty();
        if !has_text {
            return Ok(QueryResult {
                terms: self.db.filter_by_tags(tag_names)?,
                degraded: None,
            });
        }

        let index = match self.search_index() {
            Ok(index) => index,
            Err(GlossaryError::IndexBuild(err)) => {
                log::warn!(
                    "[GLOSSARY] Text search unavailable ({}), returning tag-filtered results",
                    err
                );
                return Ok(QueryResult {
                    terms: self.db.filter_by_tags(tag_names)?,
                    degraded: Some(err.to_string()),
                });
            }
            Err(err) => return Err(err),
        };

        let matched = index.search(text_query).into_iter().map(|hit| hit.term);
        let terms: Vec<Term> = if tag_names.is_empty() {
            matched.collect()
        } else {
            let allowed: HashSet<i64> = self
                .db
                .filter_by_tags(tag_names)?
                .into_iter()
                .map(|t| t.id)
                .collect();
            matched.filter(|t| allowed.contains(&t.id)).collect()
        };

        log::debug!(
            "[GLOSSARY] Query '{}' with {} tag(s) returned {} term(s)",
            text_query,
            tag_names.len(),
            terms.len()
        );
        Ok(QueryResult {
            terms,
            degraded: None,
        })
    }
}
