//! Static facts bundle appended to every aggregated tree.
//!
//! Facts are owned by the embedding application: it records per-package
//! key/value pairs whenever it likes, and each aggregation cycle copies the
//! whole bundle. A snapshot already served never changes afterwards.

use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

/// Shared handle to per-package facts. Clones refer to the same bundle.
#[derive(Debug, Clone, Default)]
pub struct Facts {
    by_package: Arc<RwLock<Map<String, Value>>>,
}

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `package.name = value`, replacing any earlier value.
    pub fn set(&self, package: &str, name: &str, value: impl Into<Value>) {
        let mut facts = self.by_package.write().unwrap_or_else(|e| e.into_inner());
        package_entry(&mut facts, package).insert(name.to_string(), value.into());
    }

    /// Add `by` to the integer fact `package.name`, starting from 0.
    ///
    /// A non-integer value already stored under that name is overwritten.
    pub fn increment(&self, package: &str, name: &str, by: i64) {
        let mut facts = self.by_package.write().unwrap_or_else(|e| e.into_inner());
        let pkg = package_entry(&mut facts, package);
        let current = pkg.get(name).and_then(Value::as_i64).unwrap_or(0);
        pkg.insert(name.to_string(), Value::from(current.saturating_add(by)));
    }

    /// Read one fact.
    pub fn get(&self, package: &str, name: &str) -> Option<Value> {
        let facts = self.by_package.read().unwrap_or_else(|e| e.into_inner());
        facts.get(package)?.get(name).cloned()
    }

    /// Deep copy of the whole bundle.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.by_package
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn package_entry<'a>(facts: &'a mut Map<String, Value>, package: &str) -> &'a mut Map<String, Value> {
    let slot = facts
        .entry(package.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("package slot was just made an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_groups_by_package() {
        let facts = Facts::new();
        facts.set("livedata", "sessions", 3);
        facts.set("mongo", "observe-drivers-oplog", 2);
        facts.set("livedata", "subscriptions", 9);
        assert_eq!(
            Value::Object(facts.snapshot()),
            json!({
                "livedata": { "sessions": 3, "subscriptions": 9 },
                "mongo": { "observe-drivers-oplog": 2 },
            })
        );
    }

    #[test]
    fn increment_starts_from_zero() {
        let facts = Facts::new();
        facts.increment("mongo", "live-results-sets", 1);
        facts.increment("mongo", "live-results-sets", 4);
        facts.increment("mongo", "live-results-sets", -2);
        assert_eq!(facts.get("mongo", "live-results-sets"), Some(json!(3)));
    }

    #[test]
    fn snapshot_is_detached() {
        let facts = Facts::new();
        facts.set("app", "version", "1.0");
        let snap = facts.snapshot();
        facts.set("app", "version", "2.0");
        facts.set("app", "extra", true);
        assert_eq!(Value::Object(snap), json!({ "app": { "version": "1.0" } }));
    }

    #[test]
    fn clones_share_the_bundle() {
        let facts = Facts::new();
        let other = facts.clone();
        other.set("pkg", "k", 1);
        assert_eq!(facts.get("pkg", "k"), Some(json!(1)));
    }

    #[test]
    fn missing_fact_is_none() {
        let facts = Facts::new();
        assert_eq!(facts.get("pkg", "k"), None);
    }
}
