//! Staged span scanner
//!
//! Every pass matches against the original reply text and records the byte
//! range it claims together with a classification. Later passes skip
//! anything overlapping an earlier claim, so no pass ever sees text that an
//! earlier pass rewrote. `clean_text` is materialized afterwards by copying
//! everything outside the excised spans.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::payload::{BlockOutcome, ChartSpec, FlowSpec, StructuredPayload, classify_json_block};

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("valid json fence regex"));
static MERMAID_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```mermaid\s*([\s\S]*?)\s*```").expect("valid mermaid fence regex")
});
static MARKDOWN_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").expect("valid markdown image regex"));
static BARE_IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://\S+\.(?:png|jpg|jpeg|gif|webp)").expect("valid image url regex")
});

/// What a claimed span of reply text turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum SpanKind {
    Chart(ChartSpec),
    Flow(FlowSpec),
    /// Valid JSON of no known shape, left in the prose
    UnrecognizedJson,
    /// Unparseable JSON, left in the prose
    MalformedJson(String),
    /// Inner markup of a ```mermaid block
    Diagram(String),
    MarkdownImage(String),
    BareImageUrl(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSpan {
    pub range: Range<usize>,
    pub kind: SpanKind,
}

impl ClassifiedSpan {
    /// Whether the span is cut out of the clean text
    pub fn is_excised(&self) -> bool {
        !matches!(self.kind, SpanKind::UnrecognizedJson | SpanKind::MalformedJson(_))
    }
}

/// Classify every payload span in `text`, ordered by position
pub fn scan_spans(text: &str) -> Vec<ClassifiedSpan> {
    let mut spans: Vec<ClassifiedSpan> = Vec::new();

    for caps in JSON_FENCE.captures_iter(text) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let kind = match classify_json_block(body.as_str()) {
            BlockOutcome::Recognized(StructuredPayload::Chart(chart)) => SpanKind::Chart(chart),
            BlockOutcome::Recognized(StructuredPayload::Flow(flow)) => SpanKind::Flow(flow),
            BlockOutcome::Unrecognized => {
                debug!(offset = whole.start(), "JSON block matches no known payload, keeping it");
                SpanKind::UnrecognizedJson
            }
            BlockOutcome::Malformed(reason) => {
                warn!(offset = whole.start(), reason = %reason, "Malformed JSON block, keeping it");
                SpanKind::MalformedJson(reason)
            }
        };
        spans.push(ClassifiedSpan {
            range: whole.range(),
            kind,
        });
    }

    for caps in MERMAID_FENCE.captures_iter(text) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        claim(&mut spans, whole.range(), || {
            SpanKind::Diagram(body.as_str().to_string())
        });
    }

    for caps in MARKDOWN_IMAGE.captures_iter(text) {
        let (Some(whole), Some(url)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        claim(&mut spans, whole.range(), || {
            SpanKind::MarkdownImage(url.as_str().to_string())
        });
    }

    // Bare URLs are only looked for in the prose left between claimed spans
    let mut bare = Vec::new();
    for gap in gaps(&spans, text.len()) {
        for found in BARE_IMAGE_URL.find_iter(&text[gap.clone()]) {
            bare.push(ClassifiedSpan {
                range: gap.start + found.start()..gap.start + found.end(),
                kind: SpanKind::BareImageUrl(found.as_str().to_string()),
            });
        }
    }
    spans.extend(bare);

    spans.sort_by_key(|span| span.range.start);
    spans
}

/// Copy `text` minus every excised span
pub fn excise(text: &str, spans: &[ClassifiedSpan]) -> String {
    let mut clean = String::with_capacity(text.len());
    let mut cursor = 0;

    for span in spans.iter().filter(|span| span.is_excised()) {
        if span.range.start < cursor {
            continue;
        }
        clean.push_str(&text[cursor..span.range.start]);
        cursor = span.range.end;
    }
    clean.push_str(&text[cursor..]);

    clean
}

fn claim<F>(spans: &mut Vec<ClassifiedSpan>, range: Range<usize>, kind: F)
where
    F: FnOnce() -> SpanKind,
{
    let taken = spans
        .iter()
        .any(|span| span.range.start < range.end && range.start < span.range.end);
    if !taken {
        spans.push(ClassifiedSpan { range, kind: kind() });
    }
}

fn gaps(spans: &[ClassifiedSpan], len: usize) -> Vec<Range<usize>> {
    let mut claimed: Vec<Range<usize>> = spans.iter().map(|span| span.range.clone()).collect();
    claimed.sort_by_key(|range| range.start);

    let mut gaps = Vec::with_capacity(claimed.len() + 1);
    let mut cursor = 0;
    for range in claimed {
        if range.start > cursor {
            gaps.push(cursor..range.start);
        }
        cursor = cursor.max(range.end);
    }
    if cursor < len {
        gaps.push(cursor..len);
    }
    gaps
}
