//! In-memory fuzzy index over every term's derived fields.
//!
//! Built wholesale from the store's current contents; there is no
//! incremental update. Stale indexes are dropped by the owner and rebuilt on
//! the next text query.

use serde::Serialize;

use super::fuzzy::Pattern;
use super::normalize::normalize;
use super::tokenizer::{Analyzer, TokenizeError};
use crate::models::Term;

/// Fields derived from one term for matching
#[derive(Debug, Clone, Serialize)]
pub struct SearchRecord {
    pub text: String,
    pub description: String,
    pub canonical_text: String,
    pub canonical_description: String,
    /// Canonical text with kanji replaced by their readings
    pub reading_text: String,
    pub reading_description: String,
    pub text_tokens: Vec<String>,
    pub description_tokens: Vec<String>,
}

impl SearchRecord {
    pub fn derive(term: &Term, analyzer: &Analyzer) -> Result<Self, TokenizeError> {
        Ok(Self {
            text: term.text.clone(),
            description: term.description.clone(),
            canonical_text: normalize(&term.text),
            canonical_description: normalize(&term.description),
            reading_text: analyzer.reading_form(&term.text)?,
            reading_description: analyzer.reading_form(&term.description)?,
            text_tokens: analyzer.tokenize(&term.text)?,
            description_tokens: analyzer.tokenize(&term.description)?,
        })
    }

    fn values(&self) -> impl Iterator<Item = &str> {
        [
            self.text.as_str(),
            self.description.as_str(),
            self.canonical_text.as_str(),
            self.canonical_description.as_str(),
            self.reading_text.as_str(),
            self.reading_description.as_str(),
        ]
        .into_iter()
        .chain(self.text_tokens.iter().map(String::as_str))
        .chain(self.description_tokens.iter().map(String::as_str))
    }
}

struct IndexedTerm {
    term: Term,
    record: SearchRecord,
    /// Lowercased, deduplicated field values
    values: Vec<Vec<char>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub term: Term,
    /// 0 = exact, 1 = unrelated
    pub score: f64,
}

pub struct SearchIndex {
    entries: Vec<IndexedTerm>,
    threshold: f64,
}

impl SearchIndex {
    /// Build from terms in `text` order; that order breaks score ties
    pub fn build(terms: Vec<Term>, analyzer: &Analyzer, threshold: f64) -> Result<Self, TokenizeError> {
        let mut entries = Vec::with_capacity(terms.len());
        for term in terms {
            let record = SearchRecord::derive(&term, analyzer)?;
            let mut values: Vec<Vec<char>> = Vec::new();
            for value in record.values() {
                if value.is_empty() {
                    continue;
                }
                let chars: Vec<char> = value.to_lowercase().chars().collect();
                if !values.contains(&chars) {
                    values.push(chars);
                }
            }
            entries.push(IndexedTerm {
                term,
                record,
                values,
            });
        }

        log::info!("[SEARCH] Built search index with {} record(s)", entries.len());
        Ok(Self { entries, threshold })
    }

    /// Terms within the threshold, best first. Both the raw query and its
    /// canonical form are tried against every field.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let canonical_query = normalize(query);
        let mut patterns = vec![Pattern::new(query)];
        if canonical_query != query.to_lowercase() {
            patterns.push(Pattern::new(&canonical_query));
        }
        patterns.retain(|p| !p.is_empty());
        if patterns.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let score = best_score(&patterns, &entry.values);
                (score <= self.threshold).then(|| SearchHit {
                    term: entry.term.clone(),
                    score,
                })
            })
            .collect();

        // Stable: equal scores keep text order
        hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        log::debug!("[SEARCH] Query '{}' matched {} record(s)", query, hits.len());
        hits
    }

    pub fn records(&self) -> impl Iterator<Item = &SearchRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn best_score(patterns: &[Pattern], values: &[Vec<char>]) -> f64 {
    let mut best = 1.0_f64;
    for pattern in patterns {
        for value in values {
            let score = pattern.score(value);
            if score < best {
                best = score;
                if best == 0.0 {
                    return best;
                }
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{ReadingDictionary, Tokenizer, TokenizerMode};
    use chrono::Utc;

    fn term(id: i64, text: &str, description: &str) -> Term {
        let now = Utc::now();
        Term {
            id,
            text: text.to_string(),
            description: description.to_string(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn analyzer() -> Analyzer {
        Analyzer::ready(Tokenizer::new(TokenizerMode::Script).unwrap())
    }

    fn ids(hits: &[SearchHit]) -> Vec<i64> {
        hits.iter().map(|h| h.term.id).collect()
    }

    #[test]
    fn test_record_derives_all_fields() {
        let analyzer = analyzer();
        let record = SearchRecord::derive(&term(1, "ﾃﾞｰﾀﾍﾞｰｽ", "関係データ"), &analyzer).unwrap();
        assert_eq!(record.text, "ﾃﾞｰﾀﾍﾞｰｽ");
        assert_eq!(record.canonical_text, "データベース");
        assert_eq!(record.canonical_description, "関係データ");
        assert_eq!(record.reading_text, "データベース");
        assert_eq!(record.text_tokens, vec!["データベース"]);
        assert_eq!(record.description_tokens, vec!["関係", "データ"]);
    }

    #[test]
    fn test_search_finds_exact_and_near_matches() {
        let analyzer = analyzer();
        let index = SearchIndex::build(
            vec![
                term(1, "API", "Application Programming Interface"),
                term(2, "SDK", "Software Development Kit"),
            ],
            &analyzer,
            0.4,
        )
        .unwrap();

        assert_eq!(ids(&index.search("api")), vec![1]);
        assert_eq!(ids(&index.search("softwre")), vec![2]);
        assert!(index.search("zzzz").is_empty());
    }

    #[test]
    fn test_search_tolerates_kana_variants() {
        let analyzer = analyzer();
        let index = SearchIndex::build(
            vec![term(1, "データベース", ""), term(2, "ネットワーク", "")],
            &analyzer,
            0.4,
        )
        .unwrap();

        assert_eq!(ids(&index.search("データベス")), vec![1]);
        assert_eq!(ids(&index.search("でーたべーす")), vec![1]);
        assert_eq!(ids(&index.search("ﾃﾞｰﾀﾍﾞｰｽ")), vec![1]);
        assert_eq!(ids(&index.search("ネットワーク")), vec![2]);
    }

    #[test]
    fn test_search_matches_reading() {
        let analyzer = Analyzer::ready(
            Tokenizer::new(TokenizerMode::Script).unwrap()
                .with_readings(ReadingDictionary::from_pairs([("関係", "かんけい")])),
        );
        let index = SearchIndex::build(vec![term(1, "関係", "")], &analyzer, 0.4).unwrap();

        assert_eq!(ids(&index.search("かんけい")), vec![1]);
    }

    #[test]
    fn test_results_sorted_by_score_then_text_order() {
        let analyzer = analyzer();
        let index = SearchIndex::build(
            vec![
                term(3, "Base", ""),
                term(1, "Basis", ""),
                term(2, "Database", ""),
            ],
            &analyzer,
            0.4,
        )
        .unwrap();

        let hits = index.search("base");
        assert_eq!(ids(&hits), vec![3, 2, 1]);
        assert_eq!(hits[0].score, 0.0);
        assert!(hits[2].score > 0.0);
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        let analyzer = analyzer();
        let index = SearchIndex::build(vec![term(1, "API", "")], &analyzer, 0.4).unwrap();
        assert!(index.search("").is_empty());
    }

    #[test]
    fn test_build_requires_ready_tokenizer() {
        let pending = Analyzer::pending();
        let result = SearchIndex::build(vec![term(1, "API", "")], &pending, 0.4);
        assert!(matches!(result, Err(TokenizeError::NotReady)));
    }

    #[test]
    fn test_empty_index() {
        let analyzer = analyzer();
        let index = SearchIndex::build(Vec::new(), &analyzer, 0.4).unwrap();
        assert!(index.is_empty());
        assert!(index.search("api").is_empty());
    }
}
