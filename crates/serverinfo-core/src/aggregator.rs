//! Multi-provider aggregation into one serializable tree.
//!
//! Architecture:
//! 1. Providers are registered once, in a fixed order
//! 2. Each cycle calls every provider's `collect()` sequentially
//! 3. Each provider's readings are reduced: scalars copied, counters
//!    flattened into key → count objects
//! 4. Sections are keyed by provider name, in registration order
//! 5. A copy of the facts bundle is appended under `facts`
//! 6. A provider that panics loses its section, not the whole tree

use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::counter::Counter;
use crate::facts::Facts;
use crate::metric::{InfoData, InfoDescription, MetricValue};
use crate::provider::Provider;

/// Section name reserved for the facts bundle.
pub const FACTS_SECTION: &str = "facts";

/// Errors raised while registering providers.
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("a provider named {0:?} is already registered")]
    DuplicateSection(String),
    #[error("section name {0:?} is reserved")]
    ReservedSection(String),
    #[error("provider section name must not be empty")]
    EmptySection,
}

/// Ordered collection of providers plus the facts bundle they are served with.
pub struct Aggregator {
    providers: Vec<Box<dyn Provider>>,
    facts: Facts,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("sections", &self.section_names())
            .field("facts", &self.facts)
            .finish()
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(Facts::new())
    }
}

impl Aggregator {
    /// Create an aggregator with no providers.
    pub fn new(facts: Facts) -> Self {
        Self {
            providers: Vec::new(),
            facts,
        }
    }

    /// Register a provider. Its section is published after every provider
    /// registered before it.
    pub fn add_provider(&mut self, provider: Box<dyn Provider>) -> Result<(), AggregatorError> {
        let name = provider.name();
        if name.is_empty() {
            return Err(AggregatorError::EmptySection);
        }
        if name == FACTS_SECTION {
            return Err(AggregatorError::ReservedSection(name.to_string()));
        }
        if self.providers.iter().any(|p| p.name() == name) {
            return Err(AggregatorError::DuplicateSection(name.to_string()));
        }
        log::debug!("registered provider {name:?}");
        self.providers.push(provider);
        Ok(())
    }

    /// Builder-style [`add_provider`](Self::add_provider).
    pub fn with_provider(mut self, provider: impl Provider + 'static) -> Result<Self, AggregatorError> {
        self.add_provider(Box::new(provider))?;
        Ok(self)
    }

    /// Number of registered providers.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Section names in registration order.
    pub fn section_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Handle to the facts bundle served with every tree.
    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    /// Run one aggregation cycle.
    pub fn collect(&self) -> AggregatedTree {
        let t0 = Instant::now();
        let mut sections = Map::new();
        for provider in &self.providers {
            let name = provider.name();
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| provider.collect())) {
                Ok(data) => {
                    sections.insert(name.to_string(), Value::Object(reduce(name, data)));
                }
                Err(panic) => {
                    log::error!(
                        "provider {name:?} panicked during collect, omitting its section: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        sections.insert(FACTS_SECTION.to_string(), Value::Object(self.facts.snapshot()));
        log::debug!(
            "aggregated {} sections in {:.3}ms",
            sections.len(),
            t0.elapsed().as_secs_f64() * 1e3
        );
        AggregatedTree { sections }
    }

    /// Metric descriptions of every provider, keyed by section name.
    ///
    /// A provider whose `describe()` panics is left out, as in [`collect`](Self::collect).
    pub fn describe(&self) -> Descriptions {
        let mut sections = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let name = provider.name();
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| provider.describe())) {
                Ok(desc) => sections.push((name.to_string(), desc)),
                Err(panic) => {
                    log::error!(
                        "provider {name:?} panicked during describe, omitting its section: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        Descriptions { sections }
    }
}

/// Reduce one provider's readings to plain JSON.
///
/// Scalars are copied verbatim; counters become `{key: count}` objects.
/// A scalar JSON cannot represent is a defect in the provider: debug builds
/// panic, release builds drop that metric and log it.
pub fn reduce(section: &str, data: InfoData) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, value) in data {
        match value {
            MetricValue::Scalar(scalar) => match scalar.to_json() {
                Some(json) => {
                    out.insert(name, json);
                }
                None => {
                    debug_assert!(
                        false,
                        "provider {section:?} reported unrepresentable value {scalar:?} for {name:?}"
                    );
                    log::warn!(
                        "dropping metric {section}.{name}: value {scalar:?} is not representable"
                    );
                }
            },
            MetricValue::Counter(counter) => {
                out.insert(name.clone(), Value::Object(flatten(section, &name, &counter)));
            }
        }
    }
    out
}

/// `{key: count}` object of one counter.
///
/// An integer key and a text key with the same rendering (`1` and `"1"`)
/// land on one JSON key; their counts are summed.
fn flatten(section: &str, name: &str, counter: &Counter) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, count) in counter.entries() {
        let rendered = key.to_string();
        match flat.get(&rendered).and_then(Value::as_u64) {
            Some(earlier) => {
                log::warn!(
                    "metric {section}.{name}: keys rendering as {rendered:?} collide, summing their counts"
                );
                flat.insert(rendered, Value::from(earlier.saturating_add(count)));
            }
            None => {
                flat.insert(rendered, Value::from(count));
            }
        }
    }
    flat
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Output of one aggregation cycle: provider sections plus `facts`.
///
/// Serializes as a single JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregatedTree {
    sections: Map<String, Value>,
}

impl AggregatedTree {
    /// Reduced readings of one section.
    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.sections.get(name).and_then(Value::as_object)
    }

    /// The copied facts bundle.
    pub fn facts(&self) -> Option<&Map<String, Value>> {
        self.section(FACTS_SECTION)
    }

    /// Section names in output order, `facts` last.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.sections
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.sections)
    }
}

/// Description document: section name → [`InfoDescription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptions {
    sections: Vec<(String, InfoDescription)>,
}

impl Descriptions {
    pub fn section(&self, name: &str) -> Option<&InfoDescription> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(n, _)| n.as_str())
    }
}

impl Serialize for Descriptions {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (name, desc) in &self.sections {
            map.serialize_entry(name, desc)?;
        }
        map.end()
    }
}
