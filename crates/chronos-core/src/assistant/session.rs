//! Conversation orchestration
//!
//! One user turn: retrieve with the latest message, build the system prompt,
//! send [system, history, user] to the backend once, extract visual content
//! from the reply and record both turns.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{AssistantConfig, Config, RetrievalConfig};
use crate::error::{Error, Result};
use crate::extraction::{ExtractedContent, extract_content};
use crate::knowledge::{KnowledgeCorpus, KnowledgeEntry};
use crate::llm::{CompletionBackend, Message, MessageRole};
use crate::render::RenderError;
use crate::retrieval::ActivationRetriever;

use super::prompt::build_system_prompt;

/// Reply text used when the model could not be reached
pub const CONNECTION_FAILURE: &str =
    "CONNECTION_FAILURE: Neural link severed. Unable to reach reasoning core.";

/// One recorded message of the conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_details: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            reasoning_details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>, reasoning_details: Option<Value>) -> Self {
        Self {
            role: MessageRole::Assistant,
            text: text.into(),
            reasoning_details,
            timestamp: Utc::now(),
        }
    }

    fn to_message(&self) -> Message {
        Message::new(self.role, self.text.clone()).with_reasoning_details(self.reasoning_details.clone())
    }
}

/// What one turn produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    /// Raw reply text as the model sent it
    pub text: String,
    pub content: ExtractedContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_details: Option<Value>,
    /// Entries the system prompt was built from; empty on connection failure
    pub context_used: Vec<KnowledgeEntry>,
    pub connection_failed: bool,
}

/// A single conversation with the assistant
///
/// Turns are serialized by `&mut self`: there is never more than one request
/// in flight.
pub struct Assistant<B> {
    backend: B,
    corpus: Arc<KnowledgeCorpus>,
    retrieval: RetrievalConfig,
    config: AssistantConfig,
    history: Vec<ChatTurn>,
    corrections_used: u32,
}

impl<B: CompletionBackend> Assistant<B> {
    pub fn new(backend: B, corpus: Arc<KnowledgeCorpus>, config: &Config) -> Self {
        Self {
            backend,
            corpus,
            retrieval: config.retrieval.clone(),
            config: config.assistant.clone(),
            history: Vec::new(),
            corrections_used: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn corpus(&self) -> &KnowledgeCorpus {
        &self.corpus
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.corrections_used = 0;
    }

    /// Correction requests still allowed for the current user turn
    pub fn corrections_remaining(&self) -> u32 {
        self.config
            .max_correction_attempts
            .saturating_sub(self.corrections_used)
    }

    /// Send a user message and wait for the reply
    ///
    /// A failed model call is not an error: it yields the connection-failure
    /// reply and is not retried.
    pub async fn send(&mut self, message: &str) -> Result<AssistantReply> {
        self.corrections_used = 0;
        self.exchange(message).await
    }

    /// Ask the model to regenerate a visual that failed to render
    ///
    /// Returns `Ok(None)` once this turn's correction budget is spent.
    pub async fn request_correction(&mut self, error: &RenderError) -> Result<Option<AssistantReply>> {
        if self.corrections_remaining() == 0 {
            debug!(kind = ?error.kind, "Correction budget spent, not asking again");
            return Ok(None);
        }
        self.corrections_used += 1;

        info!(kind = ?error.kind, attempt = self.corrections_used, "Requesting visual correction");
        self.exchange(&error.correction_request()).await.map(Some)
    }

    async fn exchange(&mut self, message: &str) -> Result<AssistantReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidInput("Message cannot be empty".to_string()));
        }

        let corpus = Arc::clone(&self.corpus);
        let retriever = ActivationRetriever::with_config(&corpus, &self.retrieval);
        let result = retriever.retrieve(message);
        let system_prompt = build_system_prompt(&result, &corpus);
        let context: Vec<KnowledgeEntry> = result.entries().cloned().collect();

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message::system(system_prompt));
        messages.extend(self.history.iter().map(ChatTurn::to_message));
        messages.push(Message::user(message));

        debug!(
            model = self.backend.model(),
            context_nodes = context.len(),
            history = self.history.len(),
            "Sending turn"
        );

        let reply = match self.backend.complete(messages).await {
            Ok(response) => AssistantReply {
                content: extract_content(&response.content),
                text: response.content,
                reasoning_details: response.reasoning_details,
                context_used: context,
                connection_failed: false,
            },
            Err(e) if e.is_connectivity() => {
                warn!(error = %e, code = e.code(), "Model call failed");
                AssistantReply {
                    text: CONNECTION_FAILURE.to_string(),
                    content: extract_content(CONNECTION_FAILURE),
                    reasoning_details: None,
                    context_used: Vec::new(),
                    connection_failed: true,
                }
            }
            Err(e) => return Err(e),
        };

        self.history.push(ChatTurn::user(message));
        self.history
            .push(ChatTurn::assistant(reply.text.clone(), reply.reasoning_details.clone()));

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::llm::{FinishReason, LlmResponse};
    use crate::render::{PreparedContent, RenderErrorKind};

    /// Replays canned replies and records every request
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<LlmResponse>>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedBackend {
        fn with(replies: Vec<Result<LlmResponse>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, messages: Vec<Message>) -> Result<LlmResponse> {
            self.requests.lock().unwrap().push(messages);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Other("no scripted reply".to_string())))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn reply(text: &str) -> Result<LlmResponse> {
        Ok(LlmResponse {
            content: text.to_string(),
            reasoning_details: None,
            model: "scripted".to_string(),
            tokens_used: 0,
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Stop,
        })
    }

    fn assistant(replies: Vec<Result<LlmResponse>>) -> Assistant<ScriptedBackend> {
        let corpus = Arc::new(KnowledgeCorpus::builtin().unwrap());
        Assistant::new(ScriptedBackend::with(replies), corpus, &Config::default())
    }

    #[tokio::test]
    async fn test_send_builds_prompt_and_records_turns() {
        let mut assistant = assistant(vec![reply("MK-677 raises IGF-1.")]);

        let answer = assistant
            .send("What happens to IGF-1 when using MK-677?")
            .await
            .unwrap();

        assert_eq!(answer.text, "MK-677 raises IGF-1.");
        assert!(!answer.connection_failed);
        assert!(answer.context_used.iter().any(|e| e.id == "k3"));
        assert!(answer.context_used.iter().any(|e| e.id == "k10"));
        assert!(answer.content.is_plain_text());

        let requests = assistant.backend().requests();
        assert_eq!(requests.len(), 1);
        let sent = &requests[0];
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, MessageRole::System);
        assert!(sent[0].content.contains("[NEURAL_NODE_ID: k3]"));
        assert_eq!(sent[1].content, "What happens to IGF-1 when using MK-677?");

        let history = assistant.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_history_carries_reasoning_details() {
        let details = json!([{"type": "reasoning.text", "text": "hmm"}]);
        let first = reply("first").map(|mut r| {
            r.reasoning_details = Some(details.clone());
            r
        });
        let mut assistant = assistant(vec![first, reply("second")]);

        let answer = assistant.send("hello there").await.unwrap();
        assert_eq!(answer.reasoning_details, Some(details.clone()));
        assistant.send("and again").await.unwrap();

        let second_request = &assistant.backend().requests()[1];
        assert_eq!(second_request.len(), 4);
        assert_eq!(second_request[2].role, MessageRole::Assistant);
        assert_eq!(second_request[2].reasoning_details, Some(details));
        assert_eq!(second_request[1].reasoning_details, None);
    }

    #[tokio::test]
    async fn test_retrieval_uses_latest_message_only() {
        let mut assistant = assistant(vec![reply("ok"), reply("ok")]);
        assistant.send("Tell me about MK-677").await.unwrap();
        assistant.send("zzz qqq").await.unwrap();

        let second_system = &assistant.backend().requests()[1][0];
        assert!(second_system.content.contains("NO ARCHIVE MATCHES"));
    }

    #[tokio::test]
    async fn test_connection_failure_becomes_reply() {
        let mut assistant = assistant(vec![Err(Error::LLMError("Server error (502)".to_string()))]);

        let answer = assistant.send("What about sleep?").await.unwrap();
        assert!(answer.connection_failed);
        assert_eq!(answer.text, CONNECTION_FAILURE);
        assert!(answer.context_used.is_empty());
        assert_eq!(assistant.backend().requests().len(), 1);
        assert_eq!(assistant.history()[1].text, CONNECTION_FAILURE);
    }

    #[tokio::test]
    async fn test_non_connectivity_error_propagates() {
        let mut assistant = assistant(vec![Err(Error::ApiKeyMissing)]);
        let result = assistant.send("hello").await;
        assert!(matches!(result, Err(Error::ApiKeyMissing)));
        assert!(assistant.history().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let mut assistant = assistant(vec![]);
        assert!(matches!(
            assistant.send("   ").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(assistant.backend().requests().is_empty());
    }

    #[tokio::test]
    async fn test_correction_is_bounded_per_turn() {
        let broken = "```mermaid\nnot a diagram\n```";
        let fixed = "```mermaid\ngraph TD\nA-->B\n```";
        let mut assistant = assistant(vec![reply(broken), reply(broken), reply(broken), reply(fixed)]);

        let answer = assistant.send("Draw the GH axis").await.unwrap();
        let prepared = PreparedContent::prepare(&answer.content);
        let error = prepared.errors().last().cloned().unwrap();
        assert_eq!(error.kind, RenderErrorKind::DiagramSyntax);

        let corrected = assistant.request_correction(&error).await.unwrap().unwrap();
        let requests = assistant.backend().requests();
        let correction_msg = &requests[1].last().unwrap().content;
        assert!(correction_msg.starts_with("The previous diagram had a syntax error"));
        assert_eq!(corrected.content.diagrams, vec!["not a diagram"]);

        // budget of one per turn is spent
        assert_eq!(assistant.corrections_remaining(), 0);
        assert!(assistant.request_correction(&error).await.unwrap().is_none());
        assert_eq!(assistant.backend().requests().len(), 2);

        // a new user turn resets the budget
        assistant.send("Try once more").await.unwrap();
        let again = assistant.request_correction(&error).await.unwrap().unwrap();
        assert_eq!(again.content.diagrams, vec!["graph TD\nA-->B"]);
    }

    #[tokio::test]
    async fn test_clear_history() {
        let mut assistant = assistant(vec![reply("ok")]);
        assistant.send("hello").await.unwrap();
        assistant.clear_history();
        assert!(assistant.history().is_empty());
    }
}
