//! # serverinfo-core
//!
//! Runtime telemetry for a long-running server process.
//!
//! `serverinfo-core` collects process and subsystem metrics (CPU, memory,
//! event-loop responsiveness, live database observers, sessions, sockets) from
//! pluggable providers and reduces them into one JSON tree.
//!
//! ## Quick Start
//!
//! ```
//! use serverinfo_core::providers::{ObserveDriver, ObserveHandle, MultiplexerSnapshot, ObserverProvider};
//! use serverinfo_core::{Aggregator, Facts};
//!
//! let registry = || {
//!     vec![MultiplexerSnapshot {
//!         driver: Some(ObserveDriver::oplog("orders")),
//!         handles: vec![ObserveHandle::delegated()],
//!     }]
//! };
//!
//! let aggregator = Aggregator::new(Facts::new())
//!     .with_provider(ObserverProvider::new(registry))
//!     .unwrap();
//!
//! let tree = aggregator.collect();
//! assert_eq!(tree.section("mongo").unwrap()["nObserveHandles"], 1);
//! ```
//!
//! ## Architecture
//!
//! Providers → Aggregator (reduce) → tree + facts
//!
//! Every source implements the [`Provider`] trait: a static description of
//! its metrics and a per-cycle collection of values. Values are either plain
//! scalars or a [`Counter`] tally, which the [`Aggregator`] flattens into a
//! key → count object. The [`Sampler`] turns cumulative CPU counters into
//! per-second rates and measures scheduler stalls with a periodic probe.

pub mod aggregator;
pub mod counter;
pub mod facts;
pub mod metric;
pub mod platform;
pub mod provider;
pub mod providers;
pub mod sampler;
pub mod settings;

pub use aggregator::{AggregatedTree, Aggregator, AggregatorError, Descriptions, FACTS_SECTION};
pub use counter::{Counter, CounterKey};
pub use facts::Facts;
pub use metric::{InfoData, InfoDescription, MetricDescription, MetricType, MetricValue, Scalar};
pub use platform::{CpuUsage, MemoryUsage, OsProcess, ProcessStats, SystemClock, WallClock};
pub use provider::Provider;
pub use sampler::{DEFAULT_LOOP_INTERVAL, NormalizedCpu, Sampler, SamplerError};
pub use settings::{Settings, SettingsError};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
