pub mod describe;
pub mod serve;
pub mod snapshot;

use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serverinfo_core::providers::{
    MultiplexerSnapshot, ObserverProvider, ProcessProvider, SessionProvider, SessionSnapshot,
    SocketProvider, SocketSnapshot,
};
use serverinfo_core::{
    Aggregator, Facts, OsProcess, ProcessStats, Sampler, Settings, SystemClock,
};

/// Print `msg` on stderr and exit non-zero.
pub fn fail(msg: impl Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

pub fn load_settings(path: Option<&Path>) -> Settings {
    let settings = match path {
        Some(path) => Settings::from_file(path)
            .unwrap_or_else(|e| fail(format!("{}: {e}", path.display()))),
        None => Settings::default(),
    };
    log::debug!("metrics path {}, basic auth user {}", settings.path, settings.user);
    settings
}

pub fn loop_interval(ms: u64) -> Duration {
    if ms == 0 {
        fail("--loop-interval-ms must be greater than zero");
    }
    Duration::from_millis(ms)
}

/// Single-threaded runtime shared by the HTTP handlers and the loop-delay
/// probe.
///
/// The probe only notices a stall when it waits on the thread the stalled
/// work holds, so every task of the process runs on this one thread.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| fail(format!("cannot start runtime: {e}")))
}

/// Facts describing this process, recorded once at startup.
fn startup_facts() -> Facts {
    let facts = Facts::new();
    let started_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    facts.set("serverinfo", "version", serverinfo_core::VERSION);
    facts.set("serverinfo", "pid", std::process::id());
    facts.set("serverinfo", "startedAt", started_ms);
    facts
}

/// Aggregator with every built-in provider.
///
/// A standalone process has no database observers, sessions or sockets of
/// its own, so those registries are empty; an embedding server passes its
/// own registries to the providers instead.
pub fn make_aggregator(loop_interval: Duration) -> (Aggregator, Arc<Sampler>) {
    let stats: Arc<dyn ProcessStats> = Arc::new(OsProcess::new());
    let sampler = Arc::new(Sampler::new(
        stats.clone(),
        Arc::new(SystemClock),
        loop_interval,
    ));

    let mut aggregator = Aggregator::new(startup_facts());
    let providers: Vec<Box<dyn serverinfo_core::Provider>> = vec![
        Box::new(ProcessProvider::new(stats, sampler.clone())),
        Box::new(ObserverProvider::new(Vec::<MultiplexerSnapshot>::new)),
        Box::new(SessionProvider::new(Vec::<SessionSnapshot>::new)),
        Box::new(SocketProvider::new(Vec::<SocketSnapshot>::new)),
    ];
    for provider in providers {
        if let Err(e) = aggregator.add_provider(provider) {
            fail(e);
        }
    }
    (aggregator, sampler)
}
