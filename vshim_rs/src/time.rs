//! Process-wide simulated time.
//!
//! Verilated models ask for the current time through a bare
//! `sc_time_stamp()` call, so the counter cannot live in a handle. It starts
//! at zero when the library is loaded, only the driving caller moves it, and
//! the shim never does.

use std::sync::atomic::{AtomicU64, Ordering};

static SIM_TIME: AtomicU64 = AtomicU64::new(0);

/// Current tick count. Pure query.
pub fn now() -> u64 {
    SIM_TIME.load(Ordering::Relaxed)
}

pub fn set(time: u64) {
    let previous = SIM_TIME.swap(time, Ordering::Relaxed);
    if time < previous {
        log::warn!("simulated time moved backwards: {previous} -> {time}");
    }
}

/// Moves time forward by `ticks` and returns the new time. Saturates at
/// `u64::MAX`.
pub fn advance(ticks: u64) -> u64 {
    let previous = SIM_TIME
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| {
            Some(t.saturating_add(ticks))
        })
        .unwrap_or_else(|t| t);
    previous.checked_add(ticks).unwrap_or_else(|| {
        log::warn!("simulated time saturated: {previous} + {ticks}");
        u64::MAX
    })
}

/// Back to the load-time value of zero, for hosts that start a new run in
/// the same process. Traces of live handles pick up again once time passes
/// their last dumped time.
pub fn reset() {
    SIM_TIME.store(0, Ordering::Relaxed);
}

/// Serializes tests that move the shared counter.
#[cfg(test)]
pub(crate) fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
