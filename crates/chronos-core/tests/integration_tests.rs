//! Chronos Core Integration Tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chronos_core::{
    Error, Result,
    assistant::{Assistant, CONNECTION_FAILURE},
    config::Config,
    extraction::{ChartType, Direction, extract_content},
    knowledge::{Category, KnowledgeCorpus},
    llm::{CompletionBackend, FinishReason, LlmResponse, Message},
    render::{ChartSeries, FlowLayout, PreparedContent, RenderErrorKind, infer_axis_keys},
    retrieval::ActivationRetriever,
};

struct QueuedBackend {
    replies: Mutex<VecDeque<Result<LlmResponse>>>,
    last_user_message: Mutex<Option<String>>,
}

impl QueuedBackend {
    fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|text| {
                        Ok(LlmResponse {
                            content: text.to_string(),
                            reasoning_details: None,
                            model: "queued".to_string(),
                            tokens_used: 0,
                            input_tokens: 0,
                            output_tokens: 0,
                            finish_reason: FinishReason::Stop,
                        })
                    })
                    .collect(),
            ),
            last_user_message: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CompletionBackend for QueuedBackend {
    async fn complete(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        *self.last_user_message.lock().unwrap() = messages.last().map(|m| m.content.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::NetworkError(reqwest_error())))
    }

    fn model(&self) -> &str {
        "queued"
    }
}

/// A reqwest error built without touching the network
fn reqwest_error() -> reqwest::Error {
    reqwest::Client::new()
        .get("not a url")
        .build()
        .unwrap_err()
}

#[test]
fn test_builtin_corpus_is_consistent() {
    let corpus = KnowledgeCorpus::builtin().unwrap();
    assert_eq!(corpus.len(), 12);
    assert!(corpus.dangling_links().is_empty());
    assert_eq!(corpus.by_category(Category::Safety).count(), 2);
}

#[test]
fn test_igf_query_reaches_linked_pathway() {
    let corpus = KnowledgeCorpus::builtin().unwrap();
    let result = ActivationRetriever::new(&corpus).retrieve("What happens to IGF-1 when using MK-677?");

    let k3 = result.get("k3").expect("k3 retrieved");
    let k10 = result.get("k10").expect("k10 retrieved");
    assert!(k3.score > k10.spread_score());
    assert_eq!(result.hits()[0].entry.id, "k3");
}

#[test]
fn test_reply_with_trailing_comma_chart() {
    let reply = "Here is the data:\n```json\n{\"type\":\"bar\",\"title\":\"T\",\"data\":[{\"name\":\"A\",\"value\":1},]}\n```\nDone.";
    let content = extract_content(reply);

    assert_eq!(content.charts.len(), 1);
    assert_eq!(content.charts[0].title, "T");
    assert_eq!(content.charts[0].chart_type, ChartType::Bar);
    assert!(!content.clean_text.contains("```"));

    let series = ChartSeries::from_spec(&content.charts[0]).unwrap();
    assert_eq!(series.labels, vec!["A"]);
    assert_eq!(series.values, vec![Some(1.0)]);
}

#[test]
fn test_axis_keys_prefer_known_names() {
    let reply = "```json\n{\"type\":\"line\",\"data\":[{\"month\":\"Jan\",\"total\":5},{\"month\":\"Feb\",\"total\":9}]}\n```";
    let content = extract_content(reply);

    let keys = infer_axis_keys(&content.charts[0].data).unwrap();
    assert_eq!(keys.label_key, "month");
    assert_eq!(keys.value_key, "total");
}

#[test]
fn test_mixed_reply_extracts_every_visual() {
    let reply = concat!(
        "Pathway below.\n",
        "```json\n{\"nodes\":[{\"id\":1,\"label\":\"MK-677\"},{\"id\":2,\"label\":\"GH\"}],\"edges\":[{\"source\":1,\"target\":2}],\"direction\":\"LR\"}\n```\n",
        "```mermaid\nsequenceDiagram\n  A->>B: hi\n```\n",
        "![scan](https://img.example/scan.png) and https://img.example/raw.jpg\n",
        "```json\n{\"unrelated\": true}\n```"
    );
    let content = extract_content(reply);

    assert_eq!(content.flow_diagrams.len(), 1);
    assert_eq!(content.diagrams.len(), 1);
    assert_eq!(
        content.images,
        vec!["https://img.example/scan.png", "https://img.example/raw.jpg"]
    );
    assert!(content.clean_text.contains("{\"unrelated\": true}"));

    let layout = FlowLayout::compute(&content.flow_diagrams[0]).unwrap();
    assert_eq!(layout.direction, Direction::LeftRight);
    assert_eq!(layout.rank_count(), 2);

    let prepared = PreparedContent::prepare(&content);
    assert!(!prepared.has_errors());
}

#[tokio::test]
async fn test_assistant_correction_cycle() {
    let corpus = Arc::new(KnowledgeCorpus::builtin().unwrap());
    let backend = QueuedBackend::new(vec![
        "Sleep cycle:\n```mermaid\nflowchart XY\n  A --> B\n```",
        "Sleep cycle:\n```mermaid\nflowchart TB\n  A --> B\n```",
    ]);
    let mut assistant = Assistant::new(backend, corpus, &Config::default());

    let reply = assistant.send("How does sleep affect recovery?").await.unwrap();
    assert!(reply.context_used.iter().any(|entry| entry.id == "k11"));

    let prepared = PreparedContent::prepare(&reply.content);
    let error = prepared.errors().next().cloned().unwrap();
    assert_eq!(error.kind, RenderErrorKind::DiagramSyntax);

    let corrected = assistant.request_correction(&error).await.unwrap().unwrap();
    let sent = assistant.backend().last_user_message.lock().unwrap().clone().unwrap();
    assert!(sent.starts_with("The previous diagram had a syntax error"));
    assert!(!PreparedContent::prepare(&corrected.content).has_errors());

    // Budget of one per user turn
    assert!(assistant.request_correction(&error).await.unwrap().is_none());
    assert_eq!(assistant.history().len(), 4);
}

#[tokio::test]
async fn test_assistant_network_failure() {
    let corpus = Arc::new(KnowledgeCorpus::builtin().unwrap());
    let mut assistant = Assistant::new(QueuedBackend::new(vec![]), corpus, &Config::default());

    let reply = assistant.send("What is BPC-157?").await.unwrap();
    assert!(reply.connection_failed);
    assert_eq!(reply.text, CONNECTION_FAILURE);
    assert!(reply.context_used.is_empty());
}
