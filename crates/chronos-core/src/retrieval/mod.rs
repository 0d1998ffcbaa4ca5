//! Knowledge retrieval
//!
//! This module provides:
//! - A tokenizer shared by queries, titles and bodies
//! - Lexical scoring of a single entry against a query
//! - One-hop activation spreading over the `related_ids` graph

mod retriever;
mod scorer;

pub use retriever::{ActivationRetriever, RetrievalResult, ScoredEntry};
pub use scorer::{LexicalScorer, QueryTokens, ScoringWeights, tokenize};
