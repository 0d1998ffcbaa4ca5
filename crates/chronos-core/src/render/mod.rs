//! Rendering preparation
//!
//! Turns extracted payloads into what a drawing backend needs, and reports
//! what cannot be drawn as structured `RenderError`s instead of failing:
//! - Chart axis-key inference and series building
//! - Layered flow-diagram layout
//! - Mermaid markup checks

mod chart;
mod diagram;
mod error;
mod flow;
mod prepare;

pub use chart::{AxisKeys, ChartSeries, infer_axis_keys};
pub use diagram::{DiagramKind, check_diagram};
pub use error::{RenderError, RenderErrorKind};
pub use flow::{FlowLayout, LayoutEdge, NODE_HEIGHT, NODE_WIDTH, PositionedNode};
pub use prepare::PreparedContent;
