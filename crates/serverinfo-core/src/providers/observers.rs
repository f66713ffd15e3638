//! Counts live database observers by strategy and by
//! observed collection.
//!
//! Observers are grouped under multiplexers: one multiplexer drives a single
//! query and fans its results out to every handle observing that query. The
//! strategy (oplog tailing vs polling) and the observed collection live on an
//! observe driver, which a handle either carries itself or inherits from its
//! multiplexer.

use crate::counter::Counter;
use crate::metric::{InfoData, InfoDescription, MetricType};
use crate::provider::Provider;

/// How an observer learns about changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserveStrategy {
    /// Tails the database operation log.
    Oplog,
    /// Re-runs the query periodically and diffs the results.
    Polling,
}

/// The component actually watching the database for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveDriver {
    pub strategy: ObserveStrategy,
    /// Name of the observed collection.
    pub collection: String,
}

impl ObserveDriver {
    pub fn oplog(collection: impl Into<String>) -> Self {
        Self {
            strategy: ObserveStrategy::Oplog,
            collection: collection.into(),
        }
    }

    pub fn polling(collection: impl Into<String>) -> Self {
        Self {
            strategy: ObserveStrategy::Polling,
            collection: collection.into(),
        }
    }
}

/// One active observation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserveHandle {
    /// Driver attached directly to the handle, if any.
    pub driver: Option<ObserveDriver>,
}

impl ObserveHandle {
    /// Handle carrying its own driver.
    pub fn with_driver(driver: ObserveDriver) -> Self {
        Self {
            driver: Some(driver),
        }
    }

    /// Handle relying on its multiplexer's driver.
    pub fn delegated() -> Self {
        Self::default()
    }
}

/// A shared multiplexer and the handles it serves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiplexerSnapshot {
    pub driver: Option<ObserveDriver>,
    pub handles: Vec<ObserveHandle>,
}

/// Read-only view of the active observers of a database driver.
pub trait ObserverRegistry: Send + Sync {
    /// Snapshot of every multiplexer and its handles.
    fn multiplexers(&self) -> Vec<MultiplexerSnapshot>;
}

impl<F> ObserverRegistry for F
where
    F: Fn() -> Vec<MultiplexerSnapshot> + Send + Sync,
{
    fn multiplexers(&self) -> Vec<MultiplexerSnapshot> {
        self()
    }
}

/// Section name of the observer metrics.
pub const SECTION: &str = "mongo";

/// Provider counting observe handles per strategy and per collection.
pub struct ObserverProvider<R> {
    registry: R,
}

impl<R: ObserverRegistry> ObserverProvider<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }
}

#[derive(Default)]
struct Tally {
    total: u64,
    oplog: Counter,
    oplog_count: u64,
    polling: Counter,
    polling_count: u64,
    unclassifiable: u64,
}

impl Tally {
    /// The handle's own driver, or else its multiplexer's.
    fn classify<'a>(
        handle: &'a ObserveHandle,
        mux: &'a MultiplexerSnapshot,
    ) -> Option<&'a ObserveDriver> {
        handle.driver.as_ref().or(mux.driver.as_ref())
    }

    fn record(&mut self, handle: &ObserveHandle, mux: &MultiplexerSnapshot) {
        self.total += 1;
        match Self::classify(handle, mux) {
            Some(driver) => match driver.strategy {
                ObserveStrategy::Oplog => {
                    self.oplog_count += 1;
                    self.oplog.increment(driver.collection.as_str());
                }
                ObserveStrategy::Polling => {
                    self.polling_count += 1;
                    self.polling.increment(driver.collection.as_str());
                }
            },
            None => self.unclassifiable += 1,
        }
    }
}

impl<R: ObserverRegistry> Provider for ObserverProvider<R> {
    fn name(&self) -> &str {
        SECTION
    }

    fn describe(&self) -> InfoDescription {
        InfoDescription::new()
            .metric("nObserveHandles", MetricType::Integer, "Overall observers count")
            .metric("oplogObserveHandles", MetricType::Counter, "Oplog-based observers[]")
            .metric("oplogObserveHandlesCount", MetricType::Integer, "Oplog-based observers")
            .metric("pollingObserveHandles", MetricType::Counter, "Polling-based observers[]")
            .metric("pollingObserveHandlesCount", MetricType::Integer, "Polling-based observers")
            .metric(
                "unclassifiableObserveHandles",
                MetricType::Integer,
                "Observers with no driver on the handle nor on its multiplexer",
            )
    }

    fn collect(&self) -> InfoData {
        let mut tally = Tally::default();
        for mux in self.registry.multiplexers() {
            for handle in &mux.handles {
                tally.record(handle, &mux);
            }
        }
        if tally.unclassifiable > 0 {
            log::warn!(
                "{} observe handle(s) have no driver on the handle or its multiplexer",
                tally.unclassifiable
            );
        }

        InfoData::new()
            .with("nObserveHandles", tally.total)
            .with("oplogObserveHandles", tally.oplog)
            .with("oplogObserveHandlesCount", tally.oplog_count)
            .with("pollingObserveHandles", tally.polling)
            .with("pollingObserveHandlesCount", tally.polling_count)
            .with("unclassifiableObserveHandles", tally.unclassifiable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::reduce;
    use serde_json::{Value, json};

    fn collect_json(mux: Vec<MultiplexerSnapshot>) -> Value {
        let provider = ObserverProvider::new(move || mux.clone());
        Value::Object(reduce(SECTION, provider.collect()))
    }

    #[test]
    fn observer_info() {
        let provider = ObserverProvider::new(Vec::<MultiplexerSnapshot>::new);
        assert_eq!(provider.name(), "mongo");
        assert_eq!(provider.describe().len(), 6);
    }

    #[test]
    fn no_observers_reports_zeroes() {
        assert_eq!(
            collect_json(Vec::new()),
            json!({
                "nObserveHandles": 0,
                "oplogObserveHandles": {},
                "oplogObserveHandlesCount": 0,
                "pollingObserveHandles": {},
                "pollingObserveHandlesCount": 0,
                "unclassifiableObserveHandles": 0,
            })
        );
    }

    #[test]
    fn counts_by_strategy_and_collection() {
        let muxes = vec![
            MultiplexerSnapshot {
                driver: Some(ObserveDriver::oplog("orders")),
                handles: vec![ObserveHandle::delegated(), ObserveHandle::delegated()],
            },
            MultiplexerSnapshot {
                driver: Some(ObserveDriver::polling("users")),
                handles: vec![ObserveHandle::delegated()],
            },
        ];
        let out = collect_json(muxes);
        assert_eq!(out["nObserveHandles"], json!(3));
        assert_eq!(out["oplogObserveHandles"], json!({ "orders": 2 }));
        assert_eq!(out["oplogObserveHandlesCount"], json!(2));
        assert_eq!(out["pollingObserveHandles"], json!({ "users": 1 }));
        assert_eq!(out["pollingObserveHandlesCount"], json!(1));
        assert_eq!(out["unclassifiableObserveHandles"], json!(0));
    }

    #[test]
    fn handle_driver_takes_precedence_over_multiplexer() {
        let muxes = vec![MultiplexerSnapshot {
            driver: Some(ObserveDriver::polling("users")),
            handles: vec![ObserveHandle::with_driver(ObserveDriver::oplog("orders"))],
        }];
        let out = collect_json(muxes);
        assert_eq!(out["oplogObserveHandles"], json!({ "orders": 1 }));
        assert_eq!(out["pollingObserveHandles"], json!({}));
    }

    #[test]
    fn handle_without_any_driver_is_unclassifiable() {
        let muxes = vec![
            MultiplexerSnapshot {
                driver: None,
                handles: vec![
                    ObserveHandle::delegated(),
                    ObserveHandle::with_driver(ObserveDriver::oplog("orders")),
                ],
            },
            MultiplexerSnapshot {
                driver: Some(ObserveDriver::oplog("orders")),
                handles: vec![ObserveHandle::delegated()],
            },
        ];
        let out = collect_json(muxes);
        assert_eq!(out["nObserveHandles"], json!(3));
        assert_eq!(out["unclassifiableObserveHandles"], json!(1));
        assert_eq!(out["oplogObserveHandles"], json!({ "orders": 2 }));
        assert_eq!(out["oplogObserveHandlesCount"], json!(2));
        assert_eq!(out["pollingObserveHandlesCount"], json!(0));
    }

    #[test]
    fn counters_reset_every_cycle() {
        let muxes = vec![MultiplexerSnapshot {
            driver: Some(ObserveDriver::oplog("orders")),
            handles: vec![ObserveHandle::delegated()],
        }];
        let provider = ObserverProvider::new(move || muxes.clone());
        let first = reduce(SECTION, provider.collect());
        let second = reduce(SECTION, provider.collect());
        assert_eq!(first, second);
        assert_eq!(second["nObserveHandles"], json!(1));
    }

    #[test]
    fn description_matches_collected_metrics() {
        let provider = ObserverProvider::new(Vec::<MultiplexerSnapshot>::new);
        let described: Vec<String> = provider.describe().names().map(str::to_string).collect();
        let collected: Vec<String> = provider.collect().names().map(str::to_string).collect();
        assert_eq!(described, collected);
    }
}
