//! Read-only access to this process's OS counters and clocks.
//!
//! The sampler and the process provider never call the OS directly; they go
//! through [`ProcessStats`] and [`WallClock`] so tests can drive them with
//! scripted readings.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Cumulative CPU time consumed by the process since it started, in
/// microseconds. Both fields are monotonically non-decreasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuUsage {
    pub user: u64,
    pub system: u64,
}

/// Point-in-time memory footprint of the process, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    /// Resident set size (heap, code segment, stack).
    pub rss: u64,
    /// Virtual address space size. 0 where the platform does not expose it.
    pub virtual_size: u64,
    /// Peak resident set size since process start.
    pub max_rss: u64,
}

/// Source of process-level OS counters.
pub trait ProcessStats: Send + Sync {
    /// Cumulative user/system CPU time.
    fn cpu_usage(&self) -> CpuUsage;

    /// Current memory footprint.
    fn memory_usage(&self) -> MemoryUsage;
}

/// Wall-clock time source, in microseconds since the Unix epoch.
pub trait WallClock: Send + Sync {
    fn now_micros(&self) -> u64;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }
}

/// Counters of the current OS process.
///
/// CPU time comes from `getrusage(RUSAGE_SELF)`. On Linux, resident and
/// virtual sizes come from `/proc/self/statm`; elsewhere the resident size
/// falls back to the rusage peak.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcess;

impl OsProcess {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessStats for OsProcess {
    fn cpu_usage(&self) -> CpuUsage {
        #[cfg(unix)]
        {
            match rusage_self() {
                Some(ru) => CpuUsage {
                    user: timeval_micros(ru.ru_utime),
                    system: timeval_micros(ru.ru_stime),
                },
                None => {
                    log::warn!("getrusage(RUSAGE_SELF) failed, reporting zero CPU time");
                    CpuUsage::default()
                }
            }
        }
        #[cfg(not(unix))]
        {
            CpuUsage::default()
        }
    }

    fn memory_usage(&self) -> MemoryUsage {
        #[cfg(unix)]
        {
            let max_rss = rusage_self().map(|ru| maxrss_bytes(ru.ru_maxrss)).unwrap_or(0);
            #[cfg(target_os = "linux")]
            if let Some((virtual_size, rss)) = linux_statm() {
                return MemoryUsage {
                    rss,
                    virtual_size,
                    max_rss,
                };
            }
            MemoryUsage {
                rss: max_rss,
                virtual_size: 0,
                max_rss,
            }
        }
        #[cfg(not(unix))]
        {
            MemoryUsage::default()
        }
    }
}

#[cfg(unix)]
fn rusage_self() -> Option<libc::rusage> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: `getrusage` fills the provided struct and has no other side
    // effects; RUSAGE_SELF is always a valid target.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc == 0 {
        // SAFETY: a zero return code means the kernel initialized the struct.
        Some(unsafe { usage.assume_init() })
    } else {
        None
    }
}

#[cfg(unix)]
fn timeval_micros(tv: libc::timeval) -> u64 {
    let secs = u64::try_from(tv.tv_sec).unwrap_or(0);
    let micros = u64::try_from(tv.tv_usec).unwrap_or(0);
    secs.saturating_mul(1_000_000).saturating_add(micros)
}

/// `ru_maxrss` is in kilobytes on Linux and in bytes on macOS.
#[cfg(unix)]
fn maxrss_bytes(raw: libc::c_long) -> u64 {
    let raw = u64::try_from(raw).unwrap_or(0);
    if cfg!(target_os = "macos") {
        raw
    } else {
        raw.saturating_mul(1024)
    }
}

#[cfg(target_os = "linux")]
fn linux_page_size() -> u64 {
    // SAFETY: `sysconf` is thread-safe for this query and has no side effects.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4096 }
}

/// `(virtual, resident)` sizes in bytes from `/proc/self/statm`.
#[cfg(target_os = "linux")]
fn linux_statm() -> Option<(u64, u64)> {
    let raw = std::fs::read_to_string("/proc/self/statm").ok()?;
    parse_statm(&raw, linux_page_size())
}

#[cfg(any(target_os = "linux", test))]
fn parse_statm(raw: &str, page_size: u64) -> Option<(u64, u64)> {
    let mut fields = raw.split_whitespace();
    let size: u64 = fields.next()?.parse().ok()?;
    let resident: u64 = fields.next()?.parse().ok()?;
    Some((size * page_size, resident * page_size))
}
