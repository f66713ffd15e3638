//! Metric values produced by providers and the static descriptions of them.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Number, Value};

use crate::counter::Counter;

/// A single numeric reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
}

impl Scalar {
    /// JSON form of this scalar, or `None` for non-finite floats, which JSON
    /// cannot represent.
    pub fn to_json(self) -> Option<Value> {
        match self {
            Self::Integer(n) => Some(Value::Number(n.into())),
            Self::Float(x) => Number::from_f64(x).map(Value::Number),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(n) => n as f64,
            Self::Float(x) => x,
        }
    }
}

macro_rules! scalar_from_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Scalar {
            fn from(n: $t) -> Self {
                Self::Integer(i64::try_from(n).unwrap_or(i64::MAX))
            }
        }
    )*};
}

scalar_from_int!(i64, i32, u32, u64, usize);

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

/// What a provider reports under one metric name.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Scalar(Scalar),
    Counter(Counter),
}

macro_rules! metric_from_scalar {
    ($($t:ty),*) => {$(
        impl From<$t> for MetricValue {
            fn from(v: $t) -> Self {
                Self::Scalar(v.into())
            }
        }
    )*};
}

metric_from_scalar!(i64, i32, u32, u64, usize, f64);

impl From<Scalar> for MetricValue {
    fn from(s: Scalar) -> Self {
        Self::Scalar(s)
    }
}

impl From<Counter> for MetricValue {
    fn from(c: Counter) -> Self {
        Self::Counter(c)
    }
}

/// One provider's readings for one collection cycle, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoData {
    entries: Vec<(String, MetricValue)>,
}

impl InfoData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, replacing any earlier value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<MetricValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for InfoData {
    type Item = (String, MetricValue);
    type IntoIter = std::vec::IntoIter<(String, MetricValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Declared shape of a metric, as published in the description document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MetricType {
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "number")]
    Number,
    /// A keyed tally, published as a key → count object.
    #[serde(rename = "array")]
    Counter,
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Number => write!(f, "number"),
            Self::Counter => write!(f, "array"),
        }
    }
}

/// `{ type, label }` metadata for one metric.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MetricDescription {
    #[serde(rename = "type")]
    pub kind: MetricType,
    pub label: String,
}

/// Static description of every metric a provider can report.
///
/// Serializes as a JSON object keyed by metric name, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoDescription {
    entries: Vec<(String, MetricDescription)>,
}

impl InfoDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: declare `name` with its type and label.
    pub fn metric(mut self, name: impl Into<String>, kind: MetricType, label: impl Into<String>) -> Self {
        let name = name.into();
        let desc = MetricDescription {
            kind,
            label: label.into(),
        };
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = desc,
            None => self.entries.push((name, desc)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&MetricDescription> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricDescription)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for InfoDescription {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, desc) in &self.entries {
            map.serialize_entry(name, desc)?;
        }
        map.end()
    }
}
