//! Abstract metric provider trait.
//!
//! Every metric source implements the [`Provider`] trait: a static
//! [`describe`](Provider::describe) of the metrics it reports and a per-cycle
//! [`collect`](Provider::collect) of their current values. The
//! [`Aggregator`](crate::aggregator::Aggregator) invokes every registered
//! provider and reduces their output into one tree.

use crate::metric::{InfoData, InfoDescription};

/// Trait that every metric source must implement.
///
/// Providers read their data through narrow read-only handles handed to them
/// at construction. `collect` may update the provider's own sampling state but
/// must not mutate anything it does not own.
pub trait Provider: Send + Sync {
    /// Section name under which the aggregated output is published
    /// (e.g. `"process"`).
    fn name(&self) -> &str;

    /// Static description of every metric `collect` can report.
    ///
    /// Must cover exactly the metric names `collect` produces.
    fn describe(&self) -> InfoDescription;

    /// Current readings. Called once per aggregation cycle.
    fn collect(&self) -> InfoData;
}

impl<P: Provider + ?Sized> Provider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn describe(&self) -> InfoDescription {
        (**self).describe()
    }

    fn collect(&self) -> InfoData {
        (**self).collect()
    }
}

impl<P: Provider + ?Sized> Provider for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn describe(&self) -> InfoDescription {
        (**self).describe()
    }

    fn collect(&self) -> InfoData {
        (**self).collect()
    }
}
