//! Model metrics envelope construction.
//!
//! Every metrics submission is tagged with a step axis. When the caller does
//! not name one, the client's [`StepCounter`] supplies `step = n` and advances.
//! The payload sent to the backend is a single-element array:
//!
//! ```text
//! [{"step_name": "step", "step_value": 3, "metrics": {"loss": 0.25}}]
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{O11yError, O11yResult};

/// Axis name used when the caller supplies none.
pub const DEFAULT_STEP_NAME: &str = "step";

/// ASCII unit separator, reserved by the backend for key flattening.
const UNIT_SEPARATOR: char = '\u{1f}';

/// A numeric metric value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
}

impl MetricValue {
    /// The value as `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Whether the value is a finite number.
    pub fn is_finite(self) -> bool {
        match self {
            Self::Int(_) => true,
            Self::Float(v) => v.is_finite(),
        }
    }
}

impl PartialEq for MetricValue {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! metric_value_from {
    ($variant:ident as $target:ty: $($ty:ty),+) => {
        $(
            impl From<$ty> for MetricValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

metric_value_from!(Int as i64: i8, i16, i32, i64, u8, u16, u32);
metric_value_from!(Float as f64: f32, f64);

/// Metric name to value.
pub type Metrics = BTreeMap<String, MetricValue>;

/// An explicit step axis for one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct XAxis {
    /// Axis name, e.g. `epoch`.
    pub name: String,
    /// Position on the axis.
    pub value: MetricValue,
}

impl XAxis {
    /// Create an axis.
    pub fn new(name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl TryFrom<Metrics> for XAxis {
    type Error = O11yError;

    /// Accepts a map holding exactly one entry.
    fn try_from(map: Metrics) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(O11yError::validation(
                "x_axis must be a map with exactly one key",
            ));
        }
        let (name, value) = map
            .into_iter()
            .next()
            .ok_or_else(|| O11yError::validation("x_axis must be a map with exactly one key"))?;
        Ok(Self { name, value })
    }
}

/// One metrics submission as handed to the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricRecord {
    /// Metric values.
    pub metrics: Metrics,
    /// Explicit axis; `None` uses the auto-incrementing step.
    pub x_axis: Option<XAxis>,
}

impl MetricRecord {
    /// Create a record on the default step axis.
    pub fn new(metrics: Metrics) -> Self {
        Self {
            metrics,
            x_axis: None,
        }
    }

    /// Attach an explicit axis.
    #[must_use]
    pub fn with_x_axis(mut self, x_axis: XAxis) -> Self {
        self.x_axis = Some(x_axis);
        self
    }

    /// Build a record from `(name, value)` pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<MetricValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Auto-incrementing step axis. Starts at 1 and never goes backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCounter(u64);

impl StepCounter {
    /// A fresh counter at step 1.
    pub fn new() -> Self {
        Self(1)
    }

    /// The step the next default-axis submission will use.
    pub fn current(self) -> u64 {
        self.0
    }

    /// Consume the current step and move to the next one.
    pub fn advance(&mut self) -> u64 {
        let step = self.0;
        self.0 = self.0.saturating_add(1);
        step
    }

    /// Back to step 1.
    pub fn reset(&mut self) {
        self.0 = 1;
    }
}

impl Default for StepCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// One record in the wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsEnvelope {
    /// Axis name.
    pub step_name: String,
    /// Axis value.
    pub step_value: MetricValue,
    /// Metric values.
    pub metrics: Metrics,
}

/// POST body for a metrics submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsPayload(pub Vec<MetricsEnvelope>);

impl MetricsEnvelope {
    /// Validate `record` and build its payload.
    ///
    /// On the default axis the counter advances, but only when the record is
    /// accepted.
    pub fn build(steps: &mut StepCounter, record: &MetricRecord) -> O11yResult<MetricsPayload> {
        validate_metrics(&record.metrics)?;

        let (step_name, step_value) = match &record.x_axis {
            Some(axis) => {
                validate_axis(axis, &record.metrics)?;
                (axis.name.clone(), axis.value)
            }
            None => {
                let step = i64::try_from(steps.current())
                    .map_err(|_| O11yError::validation("step counter overflow"))?;
                steps.advance();
                (DEFAULT_STEP_NAME.to_string(), MetricValue::Int(step))
            }
        };

        Ok(MetricsPayload(vec![Self {
            step_name,
            step_value,
            metrics: record.metrics.clone(),
        }]))
    }
}

/// Check metric keys and values.
pub fn validate_metrics(metrics: &Metrics) -> O11yResult<()> {
    for (key, value) in metrics {
        if key.is_empty() {
            return Err(O11yError::validation("metric keys must be non-empty"));
        }
        if key.contains(UNIT_SEPARATOR) {
            return Err(O11yError::validation_with_field(
                "metric keys must not contain the unit separator character",
                key.clone(),
            ));
        }
        if !value.is_finite() {
            return Err(O11yError::validation_with_field(
                format!("metric value {value} is not finite"),
                key.clone(),
            ));
        }
    }
    Ok(())
}

fn validate_axis(axis: &XAxis, metrics: &Metrics) -> O11yResult<()> {
    if axis.name.is_empty() {
        return Err(O11yError::validation("x_axis name must be non-empty"));
    }
    if !axis.value.is_finite() {
        return Err(O11yError::validation_with_field(
            "x_axis value is not finite",
            axis.name.clone(),
        ));
    }
    match metrics.get(&axis.name) {
        Some(value) if *value != axis.value => Err(O11yError::validation_with_field(
            "x_axis key must not be in your metrics, or must have the same value",
            axis.name.clone(),
        )),
        _ => Ok(()),
    }
}
