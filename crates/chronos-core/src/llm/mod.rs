//! LLM integration - OpenRouter API
//!
//! This module provides:
//! - OpenRouter HTTP client for chat completions
//! - Request/response types matching OpenAI-compatible API
//! - A backend trait the assistant is written against
//! - Rate limit retry with backoff

mod backend;
mod client;
mod types;

pub use backend::CompletionBackend;
pub use client::{LlmClient, LlmClientBuilder};
pub use types::{
    ChatRequest, ChatResponse, Choice, FinishReason, LlmResponse, Message, MessageRole,
    ReasoningOptions, Usage,
};
