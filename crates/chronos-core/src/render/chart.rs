//! Chart series preparation
//!
//! Models do not use fixed key names in chart data, so the label and value
//! keys are inferred from the first record.

use serde::Serialize;
use serde_json::Value;

use super::error::{RenderError, RenderErrorKind};
use crate::extraction::{ChartSpec, ChartType};

/// Key names preferred for the category axis
const LABEL_KEY_NAMES: [&str; 6] = ["name", "label", "date", "month", "year", "day"];

/// Key names preferred for the value axis
const VALUE_KEY_NAMES: [&str; 5] = ["value", "count", "amount", "total", "score"];

/// Series name used when the chart has no title
const UNTITLED_SERIES: &str = "Data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AxisKeys {
    pub label_key: String,
    pub value_key: String,
}

/// Pick the label and value keys from the first record
///
/// Returns `None` for empty data or a first record that is not an object with
/// keys. Records are assumed to share the first record's shape.
pub fn infer_axis_keys(data: &[Value]) -> Option<AxisKeys> {
    let first = data.first()?.as_object()?;
    let keys: Vec<&String> = first.keys().collect();

    let label_key = keys
        .iter()
        .find(|key| is_named(key, &LABEL_KEY_NAMES))
        .or_else(|| keys.iter().find(|key| first[key.as_str()].is_string()))
        .or_else(|| keys.first())?;

    let value_key = keys
        .iter()
        .find(|key| is_named(key, &VALUE_KEY_NAMES))
        .or_else(|| keys.iter().find(|key| first[key.as_str()].is_number()))
        .or_else(|| keys.get(1))
        .or_else(|| keys.first())?;

    Some(AxisKeys {
        label_key: (*label_key).clone(),
        value_key: (*value_key).clone(),
    })
}

fn is_named(key: &str, names: &[&str]) -> bool {
    let lowered = key.to_lowercase();
    names.contains(&lowered.as_str())
}

/// A chart reduced to one labelled series, ready for a plotting backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub chart_type: ChartType,
    pub series_label: String,
    pub x_axis_label: Option<String>,
    pub y_axis_label: Option<String>,
    pub keys: AxisKeys,
    pub labels: Vec<String>,
    /// `None` where a record has no numeric value under the value key
    pub values: Vec<Option<f64>>,
    /// Area charts fill under the line
    pub fill: bool,
}

impl ChartSeries {
    pub fn from_spec(spec: &ChartSpec) -> Result<Self, RenderError> {
        if spec.data.is_empty() {
            return Err(RenderError::empty_chart());
        }

        if !spec.data[0].is_object() {
            return Err(RenderError::new(
                RenderErrorKind::MissingAxisKey,
                "Chart data records must be objects with named fields",
            ));
        }

        let keys = infer_axis_keys(&spec.data).ok_or_else(|| {
            RenderError::new(
                RenderErrorKind::MissingAxisKey,
                "First data record has no keys to plot",
            )
        })?;

        let labels = spec
            .data
            .iter()
            .map(|record| label_text(record.get(keys.label_key.as_str())))
            .collect();
        let values = spec
            .data
            .iter()
            .map(|record| numeric_value(record.get(keys.value_key.as_str())))
            .collect();

        let series_label = if spec.title.is_empty() {
            UNTITLED_SERIES.to_string()
        } else {
            spec.title.clone()
        };

        Ok(Self {
            chart_type: spec.chart_type,
            series_label,
            x_axis_label: spec.x_axis_label.clone(),
            y_axis_label: spec.y_axis_label.clone(),
            keys,
            labels,
            values,
            fill: spec.chart_type == ChartType::Area,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Largest plotted value, ignoring gaps
    pub fn max_value(&self) -> Option<f64> {
        self.values.iter().flatten().copied().reduce(f64::max)
    }
}

fn label_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn numeric_value(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
