//! Reply content extraction

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::payload::{ChartSpec, FlowSpec};
use super::scanner::{SpanKind, excise, scan_spans};

/// A model reply split into prose and visual payloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    pub clean_text: String,
    pub images: Vec<String>,
    pub charts: Vec<ChartSpec>,
    pub diagrams: Vec<String>,
    pub flow_diagrams: Vec<FlowSpec>,
}

impl ExtractedContent {
    /// No payload of any kind was found
    pub fn is_plain_text(&self) -> bool {
        self.visual_count() == 0
    }

    pub fn visual_count(&self) -> usize {
        self.images.len() + self.charts.len() + self.diagrams.len() + self.flow_diagrams.len()
    }
}

/// Separate a raw model reply into clean prose and structured payloads
///
/// Never fails. JSON blocks that do not decode into a chart or flow diagram
/// stay in `clean_text` verbatim. Markdown images come before bare image
/// URLs in `images`, and a URL already collected is not repeated.
pub fn extract_content(text: &str) -> ExtractedContent {
    let spans = scan_spans(text);

    let mut content = ExtractedContent {
        clean_text: excise(text, &spans),
        ..Default::default()
    };

    let mut bare_urls = Vec::new();
    for span in &spans {
        match &span.kind {
            SpanKind::Chart(chart) => content.charts.push(chart.clone()),
            SpanKind::Flow(flow) => content.flow_diagrams.push(flow.clone()),
            SpanKind::Diagram(markup) => content.diagrams.push(markup.clone()),
            SpanKind::MarkdownImage(url) => content.images.push(url.clone()),
            SpanKind::BareImageUrl(url) => bare_urls.push(url),
            SpanKind::UnrecognizedJson | SpanKind::MalformedJson(_) => {}
        }
    }
    for url in bare_urls {
        if !content.images.contains(url) {
            content.images.push(url.clone());
        }
    }

    debug!(
        charts = content.charts.len(),
        flows = content.flow_diagrams.len(),
        diagrams = content.diagrams.len(),
        images = content.images.len(),
        "Extracted reply content"
    );

    content
}
