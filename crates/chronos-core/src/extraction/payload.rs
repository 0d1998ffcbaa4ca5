//! Structured payloads embedded in model replies
//!
//! A fenced `json` block is classified by shape: an object whose `type` is a
//! known chart type and whose `data` is an array is a chart, and one whose
//! `nodes` and `edges` are arrays is a flow diagram. Fields inside a matched
//! shape are read leniently. A block that does not parse, or matches neither
//! shape, is reported as such and left in the prose by the scanner.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

static TRAILING_COMMA_BRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*\}").expect("valid trailing-comma regex"));
static TRAILING_COMMA_BRACKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*\]").expect("valid trailing-comma regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Area,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::Area => "area",
        }
    }

    /// Exact, lowercase match only
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "line" => Some(ChartType::Line),
            "bar" => Some(ChartType::Bar),
            "area" => Some(ChartType::Area),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chart the model asked to have rendered
///
/// `data` is kept as raw JSON; records that are not objects surface later as
/// a render error rather than hiding the whole block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_optional_string", skip_serializing_if = "Option::is_none")]
    pub x_axis_label: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_string", skip_serializing_if = "Option::is_none")]
    pub y_axis_label: Option<String>,
    #[serde(default)]
    pub data: Vec<Value>,
}

/// Layout direction of a flow diagram
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB")]
    TopBottom,
    #[serde(rename = "LR")]
    LeftRight,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::TopBottom => "TB",
            Direction::LeftRight => "LR",
        }
    }

    /// Case-insensitive; `TD` is accepted as top-to-bottom
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TB" | "TD" => Some(Direction::TopBottom),
            "LR" => Some(Direction::LeftRight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
}

impl FlowNode {
    /// The label, or the id when the model left the label out
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() { &self.id } else { &self.label }
    }

    /// A bare scalar is taken as the node id
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(fields) => Self {
                id: field_text(fields, "id"),
                label: field_text(fields, "label"),
                node_type: fields.get("type").and_then(optional_text),
            },
            other => Self {
                id: text(other),
                label: String::new(),
                node_type: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FlowEdge {
    /// Missing endpoints stay empty and are reported by the layout
    fn from_value(value: &Value) -> Self {
        let empty = Map::new();
        let fields = value.as_object().unwrap_or(&empty);
        Self {
            source: field_text(fields, "source"),
            target: field_text(fields, "target"),
            label: fields.get("label").and_then(optional_text),
        }
    }
}

/// A directed node/edge diagram the model asked to have laid out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSpec {
    #[serde(deserialize_with = "lenient_nodes")]
    pub nodes: Vec<FlowNode>,
    #[serde(deserialize_with = "lenient_edges")]
    pub edges: Vec<FlowEdge>,
    /// Unknown directions read as unset
    #[serde(default, deserialize_with = "lenient_direction", skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl FlowSpec {
    pub fn direction(&self) -> Direction {
        self.direction.unwrap_or_default()
    }
}

/// The known shapes a fenced `json` block can take
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StructuredPayload {
    Chart(ChartSpec),
    Flow(FlowSpec),
}

/// Result of decoding one fenced `json` block
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Recognized(StructuredPayload),
    /// Valid JSON matching no known shape
    Unrecognized,
    /// Not valid JSON even after trailing-comma repair
    Malformed(String),
}

impl BlockOutcome {
    pub fn is_recognized(&self) -> bool {
        matches!(self, BlockOutcome::Recognized(_))
    }
}

/// Remove commas that directly precede a closing `}` or `]`
///
/// Applied to the whole block, string contents included.
pub fn strip_trailing_commas(raw: &str) -> Cow<'_, str> {
    match TRAILING_COMMA_BRACE.replace_all(raw, "}") {
        Cow::Borrowed(_) => TRAILING_COMMA_BRACKET.replace_all(raw, "]"),
        Cow::Owned(fixed) => Cow::Owned(TRAILING_COMMA_BRACKET.replace_all(&fixed, "]").into_owned()),
    }
}

/// Decode the body of a fenced `json` block into a known payload shape
///
/// The chart shape is checked first, so an object matching both is a chart.
pub fn classify_json_block(raw: &str) -> BlockOutcome {
    let repaired = strip_trailing_commas(raw);

    let value: Value = match serde_json::from_str(repaired.trim()) {
        Ok(value) => value,
        Err(e) => return BlockOutcome::Malformed(e.to_string()),
    };

    let (chart, flow) = match value.as_object() {
        Some(fields) => (is_chart_shape(fields), is_flow_shape(fields)),
        None => return BlockOutcome::Unrecognized,
    };

    let decoded = if chart {
        serde_json::from_value(value).map(StructuredPayload::Chart)
    } else if flow {
        serde_json::from_value(value).map(StructuredPayload::Flow)
    } else {
        return BlockOutcome::Unrecognized;
    };

    match decoded {
        Ok(payload) => BlockOutcome::Recognized(payload),
        Err(e) => {
            debug!(error = %e, "Known shape failed to decode");
            BlockOutcome::Unrecognized
        }
    }
}

fn is_chart_shape(fields: &Map<String, Value>) -> bool {
    let known_type = fields
        .get("type")
        .and_then(Value::as_str)
        .and_then(ChartType::parse)
        .is_some();
    known_type && fields.get("data").is_some_and(Value::is_array)
}

fn is_flow_shape(fields: &Map<String, Value>) -> bool {
    fields.get("nodes").is_some_and(Value::is_array) && fields.get("edges").is_some_and(Value::is_array)
}

/// Any JSON value as display text; null is empty
fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn optional_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(text(other)),
    }
}

fn field_text(fields: &Map<String, Value>, key: &str) -> String {
    fields.get(key).map(text).unwrap_or_default()
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| text(&value))
}

fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| optional_text(&value))
}

fn lenient_direction<'de, D>(deserializer: D) -> Result<Option<Direction>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| value.as_str().and_then(Direction::parse))
}

fn lenient_nodes<'de, D>(deserializer: D) -> Result<Vec<FlowNode>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| match value {
        Value::Array(items) => items.iter().map(FlowNode::from_value).collect(),
        _ => Vec::new(),
    })
}

fn lenient_edges<'de, D>(deserializer: D) -> Result<Vec<FlowEdge>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| match value {
        Value::Array(items) => items.iter().map(FlowEdge::from_value).collect(),
        _ => Vec::new(),
    })
}
