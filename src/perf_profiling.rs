//! Frame profiling for the graph pipeline.
//!
//! This module provides:
//! - Timing wrappers around per-frame work
//! - Periodic buffer statistics to verify steady-state frames do not reallocate
//! - Toggle mechanism to enable/disable profiling at runtime
//!
//! All profiling is optional and controlled via `set_profiling_enabled()`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Global flag to enable/disable performance profiling.
static PROFILING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Frame counter for periodic logging (every N frames).
static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How often to log buffer statistics (every N frames).
const STATS_LOG_INTERVAL: u64 = 300; // ~5 seconds at 60fps

pub fn is_profiling_enabled() -> bool {
    PROFILING_ENABLED.load(Ordering::Relaxed)
}

pub fn set_profiling_enabled(enabled: bool) {
    PROFILING_ENABLED.store(enabled, Ordering::Relaxed);
    if enabled {
        log::info!("Performance profiling ENABLED");
    } else {
        log::info!("Performance profiling DISABLED");
    }
}

/// Increment frame counter and return true if we should log this frame.
pub fn should_log_stats() -> bool {
    if !is_profiling_enabled() {
        return false;
    }
    let frame = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    frame % STATS_LOG_INTERVAL == 0
}

pub fn reset_frame_counter() {
    FRAME_COUNTER.store(0, Ordering::Relaxed);
}

/// Execute a closure, logging its duration when profiling is enabled.
pub fn timed<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    if is_profiling_enabled() {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();
        log::info!("[PERF] {}: {:.3}ms", label, elapsed.as_secs_f64() * 1000.0);
        result
    } else {
        f()
    }
}

/// Sizes of a graph's geometry buffers.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BufferStats {
    pub vertices: usize,
    pub indices: usize,
    pub reallocations: u64,
}

impl BufferStats {
    pub fn log(&self, frame: u64) {
        log::info!(
            "[PERF] Frame {} buffers: vertices={}, indices={}, reallocations={}",
            frame,
            self.vertices,
            self.indices,
            self.reallocations
        );
    }

    /// Warn when buffers were reallocated since `prev` without a size change,
    /// i.e. churn in what should be a steady state.
    pub fn check_churn(&self, prev: &BufferStats) -> Option<String> {
        if self.reallocations > prev.reallocations && self.vertices == prev.vertices && self.indices == prev.indices {
            Some(format!(
                "[PERF WARNING] Buffers reallocated {} time(s) without a size change",
                self.reallocations - prev.reallocations
            ))
        } else {
            None
        }
    }
}

/// Macro to easily time a block of code.
/// Usage: `perf_time!("label", { expensive_operation() })`
#[macro_export]
macro_rules! perf_time {
    ($label:expr, $body:expr) => {
        $crate::perf_profiling::timed($label, || $body)
    };
}
