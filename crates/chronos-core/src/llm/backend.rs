//! Completion backend abstraction

use async_trait::async_trait;

use crate::error::Result;

use super::types::{LlmResponse, Message};

/// Anything that can turn a message list into one assistant reply
///
/// Implemented by [`super::LlmClient`]; the assistant is generic over it so
/// tests and other providers can stand in for OpenRouter.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: Vec<Message>) -> Result<LlmResponse>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}
