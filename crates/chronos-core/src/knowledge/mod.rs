//! Knowledge base
//!
//! Hand-authored topic entries linked into a small directed graph. The corpus
//! is constructed explicitly and passed by reference to the retriever.

mod corpus;
mod entry;

pub use corpus::KnowledgeCorpus;
pub use entry::{Category, KnowledgeEntry};
