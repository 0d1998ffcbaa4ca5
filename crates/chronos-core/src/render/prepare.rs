//! Rendering preparation for a whole reply

use serde::Serialize;
use tracing::warn;

use super::chart::ChartSeries;
use super::diagram::{DiagramKind, check_diagram};
use super::error::RenderError;
use super::flow::FlowLayout;
use crate::extraction::ExtractedContent;

/// Every visual payload of a reply, each either ready to draw or failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedContent {
    pub charts: Vec<Result<ChartSeries, RenderError>>,
    pub diagrams: Vec<Result<DiagramKind, RenderError>>,
    pub flows: Vec<Result<FlowLayout, RenderError>>,
}

impl PreparedContent {
    pub fn prepare(content: &ExtractedContent) -> Self {
        let prepared = Self {
            charts: content.charts.iter().map(ChartSeries::from_spec).collect(),
            diagrams: content.diagrams.iter().map(|markup| check_diagram(markup)).collect(),
            flows: content.flow_diagrams.iter().map(FlowLayout::compute).collect(),
        };

        for err in prepared.errors() {
            warn!(kind = ?err.kind, message = %err.message, "Visual failed to prepare");
        }

        prepared
    }

    /// Failures in chart, diagram, flow order
    pub fn errors(&self) -> impl Iterator<Item = &RenderError> {
        let charts = self.charts.iter().filter_map(|r| r.as_ref().err());
        let diagrams = self.diagrams.iter().filter_map(|r| r.as_ref().err());
        let flows = self.flows.iter().filter_map(|r| r.as_ref().err());
        charts.chain(diagrams).chain(flows)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::extract_content;
    use crate::render::RenderErrorKind;

    #[test]
    fn test_clean_reply_prepares() {
        let content = extract_content(
            "```json\n{\"type\":\"bar\",\"data\":[{\"name\":\"A\",\"value\":1}]}\n```\n```mermaid\ngraph TD\nA-->B\n```",
        );
        let prepared = PreparedContent::prepare(&content);
        assert!(!prepared.has_errors());
        assert_eq!(prepared.charts.len(), 1);
        assert_eq!(prepared.diagrams[0], Ok(DiagramKind::Flowchart));
    }

    #[test]
    fn test_errors_in_order() {
        let content = extract_content(
            "```mermaid\nnonsense\n```\n```json\n{\"type\":\"line\",\"data\":[]}\n```",
        );
        let prepared = PreparedContent::prepare(&content);
        let kinds: Vec<_> = prepared.errors().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![RenderErrorKind::EmptyChartData, RenderErrorKind::DiagramSyntax]
        );
    }

    #[test]
    fn test_plain_text_has_nothing_to_prepare() {
        let prepared = PreparedContent::prepare(&extract_content("hello"));
        assert!(prepared.charts.is_empty() && prepared.diagrams.is_empty() && prepared.flows.is_empty());
        assert!(!prepared.has_errors());
    }
}
