//! Literal-overlap relevance boosting.
//!
//! Hosted rankers under-weight exact identifiers such as invoice or case
//! numbers. The booster rescales each candidate's raw score by how much of the
//! query literally appears in its content, then drops stragglers that fall too
//! far below the first-ranked candidate.

use regex::Regex;
use tracing::debug;

use crate::config::RelevanceConfig;
use crate::types::RetrievalCandidate;

/// Two or more uppercase letters, 4 digits, then 1+ digits: `INV-2026-003`.
const IDENTIFIER_PATTERN: &str = r"\b[A-Z]{2,}-\d{4}-\d+\b";

/// Overlap between a query and one candidate's content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchStats {
    pub id_matches: usize,
    pub id_patterns: usize,
    pub word_matches: usize,
    pub long_words: usize,
    pub ratio: f64,
}

/// Query terms extracted once per boost call.
struct QueryTerms {
    identifiers: Vec<String>,
    words: Vec<String>,
}

pub struct RelevanceBooster {
    config: RelevanceConfig,
    identifier: Option<Regex>,
}

impl RelevanceBooster {
    pub fn new(config: RelevanceConfig) -> Self {
        Self {
            config,
            identifier: Regex::new(IDENTIFIER_PATTERN).ok(),
        }
    }

    /// Rescore and filter candidates for `query`.
    ///
    /// The first input candidate sets the reference score and is never dropped.
    /// Output is ordered by boosted score descending, stable on ties.
    pub fn boost(&self, candidates: Vec<RetrievalCandidate>, query: &str) -> Vec<RetrievalCandidate> {
        let terms = self.terms(query);
        let mut top_score = 0.0;
        let mut kept = Vec::with_capacity(candidates.len());

        for (position, mut candidate) in candidates.into_iter().enumerate() {
            let stats = self.stats_for(&terms, &candidate.raw_content);
            candidate.boosted_score = self.boosted(candidate.raw_score, stats.ratio);

            debug!(
                title = %candidate.title,
                raw = candidate.raw_score,
                boosted = candidate.boosted_score,
                id_matches = stats.id_matches,
                id_patterns = stats.id_patterns,
                word_matches = stats.word_matches,
                long_words = stats.long_words,
                "Scored candidate"
            );

            if position == 0 {
                top_score = candidate.boosted_score;
            } else if top_score > 0.0 {
                let ratio = candidate.boosted_score / top_score;
                if ratio < self.config.drop_ratio {
                    debug!(
                        title = %candidate.title,
                        ratio,
                        "Dropping candidate below relevance ratio"
                    );
                    continue;
                }
            }
            kept.push(candidate);
        }

        kept.sort_by(|a, b| b.boosted_score.total_cmp(&a.boosted_score));
        kept
    }

    /// Overlap statistics for a single piece of content.
    pub fn score(&self, query: &str, content: &str) -> MatchStats {
        self.stats_for(&self.terms(query), content)
    }

    /// `raw * (1 + ratio * (max_boost - 1))`; with the default cap of 5 this is
    /// `raw * (1 + ratio * 4)`.
    pub fn boosted(&self, raw_score: f64, ratio: f64) -> f64 {
        raw_score * (1.0 + ratio * (self.config.max_boost - 1.0))
    }

    fn terms(&self, query: &str) -> QueryTerms {
        let identifiers = self
            .identifier
            .as_ref()
            .map(|re| re.find_iter(query).map(|m| m.as_str().to_string()).collect())
            .unwrap_or_default();
        let words = query
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.chars().count() >= self.config.min_word_len)
            .map(str::to_string)
            .collect();
        QueryTerms { identifiers, words }
    }

    fn stats_for(&self, terms: &QueryTerms, content: &str) -> MatchStats {
        let id_matches = terms
            .identifiers
            .iter()
            .filter(|id| content.contains(id.as_str()))
            .count();
        let lowered = content.to_lowercase();
        let word_matches = terms
            .words
            .iter()
            .filter(|w| lowered.contains(w.as_str()))
            .count();

        let weight = self.config.identifier_weight;
        let total_matches = id_matches * weight + word_matches;
        let total_possible = terms.identifiers.len() * weight + terms.words.len();
        let ratio = if total_possible == 0 {
            0.0
        } else {
            total_matches as f64 / total_possible as f64
        };

        MatchStats {
            id_matches,
            id_patterns: terms.identifiers.len(),
            word_matches,
            long_words: terms.words.len(),
            ratio,
        }
    }
}

impl Default for RelevanceBooster {
    fn default() -> Self {
        Self::new(RelevanceConfig::default())
    }
}
