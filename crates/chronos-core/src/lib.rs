//! Chronos Core Library
//!
//! This crate provides the core functionality for Chronos, including:
//! - Knowledge corpus (hand-authored entries linked by related ids)
//! - Lexical scoring and one-hop activation-spreading retrieval
//! - Content extraction from model replies (charts, flows, diagrams, images)
//! - Rendering preparation (axis inference, flow layout, diagram checks)
//! - LLM integration (OpenRouter API)
//! - Assistant orchestration with bounded visual corrections

pub mod assistant;
pub mod config;
pub mod error;
pub mod extraction;
pub mod knowledge;
pub mod llm;
pub mod render;
pub mod retrieval;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::assistant::{Assistant, AssistantReply};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::extraction::{ExtractedContent, extract_content};
    pub use crate::knowledge::{Category, KnowledgeCorpus, KnowledgeEntry};
    pub use crate::retrieval::{ActivationRetriever, RetrievalResult};
}
