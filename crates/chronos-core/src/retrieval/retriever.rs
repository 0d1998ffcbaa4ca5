//! Activation-spreading retrieval
//!
//! Every entry is scored lexically; each entry with a positive score then
//! passes a fraction of that score to the entries it links to. Spreading is a
//! single hop computed from the pre-spread scores, so the order in which
//! sources are visited cannot change the result.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::RetrievalConfig;
use crate::knowledge::{KnowledgeCorpus, KnowledgeEntry};

use super::scorer::{LexicalScorer, QueryTokens};

/// One ranked entry
#[derive(Debug, Clone, Serialize)]
pub struct ScoredEntry<'a> {
    pub entry: &'a KnowledgeEntry,
    /// Direct score plus everything spread into this entry
    pub score: f64,
    /// Lexical score before spreading; 0 for entries reached only by a link
    pub direct_score: f64,
}

impl ScoredEntry<'_> {
    pub fn is_spread_only(&self) -> bool {
        self.direct_score <= 0.0
    }

    pub fn spread_score(&self) -> f64 {
        self.score - self.direct_score
    }
}

/// Ranked, size-bounded retrieval output for one query
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult<'a> {
    hits: Vec<ScoredEntry<'a>>,
}

impl<'a> RetrievalResult<'a> {
    /// Hits in descending score order
    pub fn hits(&self) -> &[ScoredEntry<'a>] {
        &self.hits
    }

    pub fn entries(&self) -> impl Iterator<Item = &'a KnowledgeEntry> + '_ {
        self.hits.iter().map(|hit| hit.entry)
    }

    pub fn get(&self, id: &str) -> Option<&ScoredEntry<'a>> {
        self.hits.iter().find(|hit| hit.entry.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn is_spread_only(&self, id: &str) -> bool {
        self.get(id).is_some_and(ScoredEntry::is_spread_only)
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Accumulated activation for one entry, kept in first-activation order
struct Activation<'a> {
    entry: &'a KnowledgeEntry,
    direct: f64,
    spread: f64,
}

impl Activation<'_> {
    fn total(&self) -> f64 {
        self.direct + self.spread
    }
}

/// Retriever over a borrowed, immutable corpus
#[derive(Debug, Clone)]
pub struct ActivationRetriever<'a> {
    corpus: &'a KnowledgeCorpus,
    scorer: LexicalScorer,
    spread_factor: f64,
    activation_floor: f64,
    max_results: usize,
}

impl<'a> ActivationRetriever<'a> {
    /// Retriever with the default tuning (spread 0.5, floor 0.5, top 10)
    pub fn new(corpus: &'a KnowledgeCorpus) -> Self {
        Self::with_config(corpus, &RetrievalConfig::default())
    }

    pub fn with_config(corpus: &'a KnowledgeCorpus, config: &RetrievalConfig) -> Self {
        Self {
            corpus,
            scorer: LexicalScorer::new(config.weights),
            spread_factor: config.spread_factor,
            activation_floor: config.activation_floor,
            max_results: config.max_results,
        }
    }

    pub fn corpus(&self) -> &'a KnowledgeCorpus {
        self.corpus
    }

    /// Rank the corpus against a free-text query
    ///
    /// A query that matches nothing yields an empty result, not an error.
    pub fn retrieve(&self, query: &str) -> RetrievalResult<'a> {
        let tokens = QueryTokens::new(query);
        if tokens.is_empty() {
            debug!("Query has no usable tokens");
            return RetrievalResult::default();
        }

        let mut activations = self.direct_hits(&tokens);
        let direct_count = activations.len();
        self.spread(&mut activations);

        // Stable sort: ties keep corpus order, then first-activation order
        activations.sort_by(|a, b| b.total().total_cmp(&a.total()));

        let hits: Vec<ScoredEntry<'a>> = activations
            .into_iter()
            .filter(|activation| activation.total() > self.activation_floor)
            .take(self.max_results)
            .map(|activation| ScoredEntry {
                entry: activation.entry,
                score: activation.total(),
                direct_score: activation.direct,
            })
            .collect();

        info!(
            tokens = tokens.len(),
            direct_hits = direct_count,
            returned = hits.len(),
            "Knowledge retrieval complete"
        );

        RetrievalResult { hits }
    }

    fn direct_hits(&self, tokens: &QueryTokens) -> Vec<Activation<'a>> {
        let corpus: &'a KnowledgeCorpus = self.corpus;
        corpus
            .entries()
            .iter()
            .filter_map(|entry| {
                let score = self.scorer.score(tokens, entry);
                debug!(id = %entry.id, score, "Scored entry");
                (score > 0.0).then_some(Activation {
                    entry,
                    direct: score,
                    spread: 0.0,
                })
            })
            .collect()
    }

    fn spread(&self, activations: &mut Vec<Activation<'a>>) {
        let corpus: &'a KnowledgeCorpus = self.corpus;
        let mut position: HashMap<&'a str, usize> = activations
            .iter()
            .enumerate()
            .map(|(i, activation)| {
                let entry: &'a KnowledgeEntry = activation.entry;
                (entry.id.as_str(), i)
            })
            .collect();

        // Snapshot: only direct hits spread, and only their direct score
        let sources: Vec<(&'a KnowledgeEntry, f64)> = activations
            .iter()
            .map(|activation| (activation.entry, activation.direct))
            .collect();

        for (source, source_score) in sources {
            let excitation = source_score * self.spread_factor;

            for target_id in &source.related_ids {
                let Some(target) = corpus.get(target_id) else {
                    debug!(source = %source.id, target = %target_id, "Skipping link to unknown entry");
                    continue;
                };

                match position.get(target.id.as_str()) {
                    Some(&i) => activations[i].spread += excitation,
                    None => {
                        position.insert(target.id.as_str(), activations.len());
                        activations.push(Activation {
                            entry: target,
                            direct: 0.0,
                            spread: excitation,
                        });
                    }
                }
            }
        }
    }
}
