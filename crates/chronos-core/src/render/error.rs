//! Rendering-time failures
//!
//! These are values, not `crate::Error` variants: a reply that parsed fine can
//! still fail to render, and the failure is shown inline next to the prose.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderErrorKind {
    /// Chart with an empty `data` sequence
    EmptyChartData,
    /// First data record has no keys to plot
    MissingAxisKey,
    /// Diagram markup the renderer cannot read
    DiagramSyntax,
    /// Flow diagram whose edges do not line up with its nodes
    FlowStructure,
}

impl RenderErrorKind {
    /// What the model produced, as named in a correction request
    pub fn subject(&self) -> &'static str {
        match self {
            RenderErrorKind::EmptyChartData | RenderErrorKind::MissingAxisKey => "chart",
            RenderErrorKind::DiagramSyntax => "diagram",
            RenderErrorKind::FlowStructure => "flow diagram",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{} error: {message}", .kind.subject())]
pub struct RenderError {
    pub kind: RenderErrorKind,
    pub message: String,
}

impl RenderError {
    pub fn new(kind: RenderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn empty_chart() -> Self {
        Self::new(RenderErrorKind::EmptyChartData, "Chart has no data")
    }

    pub fn diagram_syntax(message: impl Into<String>) -> Self {
        Self::new(RenderErrorKind::DiagramSyntax, message)
    }

    pub fn flow_structure(message: impl Into<String>) -> Self {
        Self::new(RenderErrorKind::FlowStructure, message)
    }

    /// The follow-up user message asking the model to fix its output
    pub fn correction_request(&self) -> String {
        format!(
            "The previous {} had a syntax error: \"{}\". Please regenerate it with correct syntax.",
            self.kind.subject(),
            self.message
        )
    }
}
