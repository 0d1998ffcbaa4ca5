//! Content extraction from model replies
//!
//! This module provides:
//! - Typed decoding of fenced `json` blocks into charts and flow diagrams
//! - A staged scanner that classifies payload spans in the reply text
//! - `extract_content`, which splits a reply into prose and payloads

mod content;
mod payload;
mod scanner;

pub use content::{ExtractedContent, extract_content};
pub use payload::{
    BlockOutcome, ChartSpec, ChartType, Direction, FlowEdge, FlowNode, FlowSpec,
    StructuredPayload, classify_json_block, strip_trailing_commas,
};
pub use scanner::{ClassifiedSpan, SpanKind, excise, scan_spans};
