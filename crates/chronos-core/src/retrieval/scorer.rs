//! Lexical relevance scoring
//!
//! A cheap stand-in for embedding similarity: keyword anchors carry most of
//! the weight, title words some, and body matches a log-damped remainder.

use std::collections::HashSet;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::knowledge::KnowledgeEntry;

/// Tokens shorter than this are discarded
const MIN_TOKEN_LEN: usize = 3;

/// Weights for each scoring signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Keyword anchor equal to a query token
    pub keyword_exact: f64,
    /// Keyword anchor and query token contain one another
    pub keyword_partial: f64,
    /// Per title token found in the query
    pub title: f64,
    /// Multiplier on `ln(content_matches + 1)`
    pub content: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            keyword_exact: 20.0,
            keyword_partial: 8.0,
            title: 12.0,
            content: 3.0,
        }
    }
}

impl ScoringWeights {
    /// Negative or non-finite weights would break the score >= 0 guarantee
    pub fn validate(&self) -> anyhow::Result<()> {
        let weights = [
            ("keyword_exact", self.keyword_exact),
            ("keyword_partial", self.keyword_partial),
            ("title", self.title),
            ("content", self.content),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(anyhow!("Scoring weight '{}' must be a non-negative number", name));
            }
        }
        Ok(())
    }
}

/// Lower-case, drop everything but ASCII word characters and whitespace,
/// split on whitespace, keep tokens of three characters or more.
///
/// Used identically for queries, titles and bodies.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// A tokenized query
///
/// Keeps the token sequence (duplicates included, they count toward partial
/// keyword matches) alongside a set for membership checks.
#[derive(Debug, Clone, Default)]
pub struct QueryTokens {
    tokens: Vec<String>,
    set: HashSet<String>,
}

impl QueryTokens {
    pub fn new(query: &str) -> Self {
        let tokens = tokenize(query);
        let set = tokens.iter().cloned().collect();
        Self { tokens, set }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.set.contains(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Scores one entry against a tokenized query
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalScorer {
    weights: ScoringWeights,
}

impl LexicalScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Non-negative relevance with no upper bound; 0 for an empty query
    pub fn score(&self, query: &QueryTokens, entry: &KnowledgeEntry) -> f64 {
        if query.is_empty() {
            return 0.0;
        }

        self.keyword_score(query, entry) + self.title_score(query, entry) + self.content_score(query, entry)
    }

    fn keyword_score(&self, query: &QueryTokens, entry: &KnowledgeEntry) -> f64 {
        let mut score = 0.0;

        for keyword in &entry.keywords {
            // An empty anchor is a substring of every token
            let anchor = keyword.to_lowercase();

            if query.contains(&anchor) {
                score += self.weights.keyword_exact;
            }

            // Counted once per query token, so one anchor can hit several times
            let partial_hits = query
                .iter()
                .filter(|token| anchor.contains(token) || token.contains(anchor.as_str()))
                .count();
            score += self.weights.keyword_partial * partial_hits as f64;
        }

        score
    }

    fn title_score(&self, query: &QueryTokens, entry: &KnowledgeEntry) -> f64 {
        let hits = tokenize(&entry.title)
            .iter()
            .filter(|token| query.contains(token))
            .count();
        self.weights.title * hits as f64
    }

    fn content_score(&self, query: &QueryTokens, entry: &KnowledgeEntry) -> f64 {
        let matches = tokenize(&entry.content)
            .iter()
            .filter(|token| query.contains(token))
            .count();
        self.weights.content * (matches as f64 + 1.0).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Category;

    fn entry() -> KnowledgeEntry {
        KnowledgeEntry::new(
            "k3",
            "MK-677: Ghrelin Mimetic",
            Category::Compound,
            "Stimulates growth hormone. Growth is pulsatile.",
        )
        .with_keywords(["mk677", "igf1", "sleep"])
    }

    #[test]
    fn test_tokenize_contract() {
        assert_eq!(
            tokenize("What happens to IGF-1 when using MK-677?"),
            vec!["what", "happens", "igf1", "when", "using", "mk677"]
        );
    }

    #[test]
    fn test_tokenize_drops_short_and_punctuation() {
        assert_eq!(tokenize("a an the GH; ok!! __x"), vec!["the", "__x"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t ").is_empty());
    }

    #[test]
    fn test_tokenize_strips_non_ascii() {
        assert_eq!(tokenize("20°C café"), vec!["20c", "caf"]);
    }

    #[test]
    fn test_empty_query_scores_zero() {
        let scorer = LexicalScorer::default();
        assert_eq!(scorer.score(&QueryTokens::new(""), &entry()), 0.0);
        assert_eq!(scorer.score(&QueryTokens::new("a b ?!"), &entry()), 0.0);
    }

    #[test]
    fn test_exact_keyword_match() {
        let scorer = LexicalScorer::default();
        // exact 20 + partial 8 (the token equals the anchor)
        assert_eq!(scorer.score(&QueryTokens::new("igf1"), &entry()), 28.0);
    }

    #[test]
    fn test_two_keywords_are_additive() {
        let scorer = LexicalScorer::default();
        let score = scorer.score(&QueryTokens::new("igf1 mk677"), &entry());
        assert!(score >= 40.0);
        // two anchors at 28 each, plus "mk677" in the title
        assert_eq!(score, 68.0);
    }

    #[test]
    fn test_partial_keyword_match_both_directions() {
        let scorer = LexicalScorer::default();
        // "sleeping" contains "sleep"; "mk6" is contained in "mk677"
        let score = scorer.score(&QueryTokens::new("sleeping mk6"), &entry());
        assert_eq!(score, 16.0);
    }

    #[test]
    fn test_duplicate_query_tokens_multiply_partial_hits() {
        let scorer = LexicalScorer::default();
        let once = scorer.score(&QueryTokens::new("sleeping"), &entry());
        let twice = scorer.score(&QueryTokens::new("sleeping sleeping"), &entry());
        assert_eq!(twice, once * 2.0);
    }

    #[test]
    fn test_title_match() {
        let scorer = LexicalScorer::default();
        let score = scorer.score(&QueryTokens::new("ghrelin"), &entry());
        assert_eq!(score, 12.0);
    }

    #[test]
    fn test_content_matches_are_log_damped() {
        let scorer = LexicalScorer::default();
        // "growth" appears twice in the body
        let score = scorer.score(&QueryTokens::new("growth"), &entry());
        assert!((score - 3.0 * 3f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_custom_weights() {
        let scorer = LexicalScorer::new(ScoringWeights {
            keyword_exact: 1.0,
            keyword_partial: 0.0,
            title: 0.0,
            content: 0.0,
        });
        assert_eq!(scorer.score(&QueryTokens::new("igf1 sleep"), &entry()), 2.0);
    }

    #[test]
    fn test_empty_anchor_matches_every_token() {
        let entry = KnowledgeEntry::new("k1", "Zzz", Category::Safety, "").with_keywords([""]);
        let query = QueryTokens::new("alpha beta gamma");
        assert_eq!(LexicalScorer::default().score(&query, &entry), 24.0);
    }

    #[test]
    fn test_weights_validate() {
        assert!(ScoringWeights::default().validate().is_ok());
        let bad = ScoringWeights {
            title: -1.0,
            ..ScoringWeights::default()
        };
        assert!(bad.validate().is_err());
        let nan = ScoringWeights {
            content: f64::NAN,
            ..ScoringWeights::default()
        };
        assert!(nan.validate().is_err());
    }
}
