//! Process-level metrics: normalized CPU, loop delay and memory.

use std::sync::Arc;

use crate::metric::{InfoData, InfoDescription, MetricType};
use crate::platform::ProcessStats;
use crate::provider::Provider;
use crate::sampler::Sampler;

/// Section name of the process metrics.
pub const SECTION: &str = "process";

/// Reports the host process's CPU rates, loop delay and memory footprint.
///
/// CPU figures advance the shared [`Sampler`]'s baseline on every collection,
/// so one sampler should feed one provider.
pub struct ProcessProvider {
    stats: Arc<dyn ProcessStats>,
    sampler: Arc<Sampler>,
}

impl ProcessProvider {
    pub fn new(stats: Arc<dyn ProcessStats>, sampler: Arc<Sampler>) -> Self {
        Self { stats, sampler }
    }

    pub fn sampler(&self) -> &Arc<Sampler> {
        &self.sampler
    }
}

impl Provider for ProcessProvider {
    fn name(&self) -> &str {
        SECTION
    }

    fn describe(&self) -> InfoDescription {
        InfoDescription::new()
            .metric("cpuUser", MetricType::Number, "CPU user (s/s)")
            .metric("cpuSystem", MetricType::Number, "CPU system (s/s)")
            .metric("loopDelay", MetricType::Number, "Event loop delay (ms)")
            .metric("ramRss", MetricType::Integer, "Resident set size (bytes)")
            .metric("ramVirtual", MetricType::Integer, "Virtual memory size (bytes)")
            .metric("ramMaxRss", MetricType::Integer, "Peak resident set size (bytes)")
    }

    fn collect(&self) -> InfoData {
        let cpu = self.sampler.sample();
        let memory = self.stats.memory_usage();
        InfoData::new()
            .with("cpuUser", cpu.user)
            .with("cpuSystem", cpu.system)
            .with("loopDelay", self.sampler.poll_loop())
            .with("ramRss", memory.rss)
            .with("ramVirtual", memory.virtual_size)
            .with("ramMaxRss", memory.max_rss)
    }
}
