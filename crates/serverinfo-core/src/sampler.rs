//! CPU rate normalization and event-loop delay detection.
//!
//! Two independent cadences share one [`Sampler`]:
//!
//! - **CPU** is caller-driven. Every [`Sampler::sample`] turns the cumulative
//!   `(user, system)` CPU counters into "CPU seconds per wall-clock second"
//!   since the previous call. The first call is measured against a baseline
//!   taken at construction, not against process start.
//! - **Loop delay** is scheduler-driven. A probe task sleeps for a fixed
//!   nominal interval and records how late it woke up. A healthy runtime wakes
//!   it on time (delay ≈ 0); a runtime starved by blocking work wakes it late,
//!   by roughly the time something held the worker thread.
//!   [`Sampler::poll_loop`] only reads the latest delay; it never probes.
//!
//! The probe runs on the ambient tokio runtime and is owned by the sampler:
//! [`Sampler::stop`] (or dropping the sampler) cancels it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::platform::{CpuUsage, OsProcess, ProcessStats, SystemClock, WallClock};

/// Default nominal probe interval.
///
/// Long enough for probe overhead to be negligible, short enough to catch
/// sustained stalls.
pub const DEFAULT_LOOP_INTERVAL: Duration = Duration::from_millis(10_000);

/// Elapsed time assumed when two CPU samples land on the same clock tick.
const SAME_TICK_ELAPSED_US: u64 = 1_000;

/// Errors raised by the sampler's probe lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// No tokio runtime is available to schedule the loop-delay probe on.
    #[error("cannot schedule the loop-delay probe: no tokio runtime is running")]
    NoRuntime,
    #[error("loop-delay probe interval must be greater than zero")]
    ZeroInterval,
}

/// CPU usage normalized per wall-clock second since the previous sample.
///
/// Values above 1.0 are expected when several cores work concurrently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NormalizedCpu {
    pub user: f64,
    pub system: f64,
}

#[derive(Debug)]
struct SamplerState {
    latest_cpu: CpuUsage,
    latest_poll_us: u64,
    latest_probe: Option<Instant>,
    latest_delay_ms: f64,
    probes: u64,
}

/// Turns cumulative process counters into rate-normalized readings and
/// measures event-loop delay.
pub struct Sampler {
    stats: Arc<dyn ProcessStats>,
    clock: Arc<dyn WallClock>,
    interval: Duration,
    state: Arc<Mutex<SamplerState>>,
    probe: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Sampler {
    /// Create a sampler over the given counters and clock, taking the CPU
    /// baseline immediately. The loop-delay probe is not started.
    pub fn new(stats: Arc<dyn ProcessStats>, clock: Arc<dyn WallClock>, interval: Duration) -> Self {
        let state = SamplerState {
            latest_cpu: stats.cpu_usage(),
            latest_poll_us: clock.now_micros(),
            latest_probe: None,
            latest_delay_ms: 0.0,
            probes: 0,
        };
        Self {
            stats,
            clock,
            interval,
            state: Arc::new(Mutex::new(state)),
            probe: Mutex::new(None),
        }
    }

    /// Sampler over this OS process with the default probe interval.
    pub fn system() -> Self {
        Self::new(
            Arc::new(OsProcess::new()),
            Arc::new(SystemClock),
            DEFAULT_LOOP_INTERVAL,
        )
    }

    /// Nominal loop-delay probe interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// CPU consumed since the previous sample, normalized per second.
    pub fn sample(&self) -> NormalizedCpu {
        let now_us = self.clock.now_micros();
        let reading = self.stats.cpu_usage();

        let mut state = self.lock_state();
        let normalized = normalize(state.latest_cpu, state.latest_poll_us, reading, now_us);
        state.latest_cpu = reading;
        state.latest_poll_us = now_us;
        normalized
    }

    /// Latest measured loop delay in milliseconds.
    ///
    /// Reads 0.0 until the first probe tick, and keeps the last known value
    /// once the probe is stopped or could not be scheduled.
    pub fn poll_loop(&self) -> f64 {
        self.lock_state().latest_delay_ms
    }

    /// Number of probe ticks recorded so far.
    pub fn probe_count(&self) -> u64 {
        self.lock_state().probes
    }

    /// Start the loop-delay probe on the current tokio runtime.
    ///
    /// Starting an already running sampler is a no-op.
    pub fn start(&self) -> Result<(), SamplerError> {
        if self.interval.is_zero() {
            return Err(SamplerError::ZeroInterval);
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|_| SamplerError::NoRuntime)?;

        let mut probe = self.probe.lock().unwrap_or_else(|e| e.into_inner());
        if probe.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        self.lock_state().latest_probe = Some(Instant::now());
        let state = Arc::clone(&self.state);
        let interval = self.interval;
        *probe = Some(handle.spawn(run_probe(state, interval)));
        log::debug!("loop-delay probe started, interval {}ms", interval.as_millis());
        Ok(())
    }

    /// Cancel the loop-delay probe. Safe to call repeatedly, or on a sampler
    /// that was never started.
    pub fn stop(&self) {
        let task = self.probe.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            task.abort();
            log::debug!("loop-delay probe stopped");
        }
    }

    /// Whether a probe task is currently scheduled.
    pub fn is_running(&self) -> bool {
        self.probe
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn lock_state(&self) -> MutexGuard<'_, SamplerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-second CPU rates between two cumulative readings.
///
/// A zero (or backwards) wall-clock step counts as one millisecond, and a
/// counter that went backwards counts as no CPU used, so results are always
/// finite and non-negative.
fn normalize(prev: CpuUsage, prev_us: u64, cur: CpuUsage, now_us: u64) -> NormalizedCpu {
    let elapsed_us = match now_us.saturating_sub(prev_us) {
        0 => SAME_TICK_ELAPSED_US,
        n => n,
    };
    let elapsed = elapsed_us as f64;
    NormalizedCpu {
        user: cur.user.saturating_sub(prev.user) as f64 / elapsed,
        system: cur.system.saturating_sub(prev.system) as f64 / elapsed,
    }
}

async fn run_probe(state: Arc<Mutex<SamplerState>>, interval: Duration) {
    let nominal_ms = interval.as_secs_f64() * 1e3;
    loop {
        tokio::time::sleep(interval).await;
        let now = Instant::now();
        let mut st = state.lock().unwrap_or_else(|e| e.into_inner());
        let last = st.latest_probe.unwrap_or(now);
        let delay_ms = now.duration_since(last).as_secs_f64() * 1e3 - nominal_ms;
        st.latest_probe = Some(now);
        st.latest_delay_ms = delay_ms;
        st.probes += 1;
        drop(st);

        if delay_ms > nominal_ms {
            log::warn!("event loop delayed by {delay_ms:.2}ms (probe interval {nominal_ms:.0}ms)");
        } else {
            log::debug!("loop delay: {delay_ms:.2}ms");
        }
    }
}
