// src/util.rs
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative stop signal shared by the driver, the signal handler and both
/// worker threads. The signal handler performs only the store.
pub struct ShutdownFlag(AtomicBool);

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self(AtomicBool::new(false))
    }
}

impl ShutdownFlag {
    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[inline]
pub fn now_nanos() -> u64 {
    #[cfg(target_os = "linux")]
    {
        use nix::time::{clock_gettime, ClockId};
        if let Ok(ts) = clock_gettime(ClockId::CLOCK_MONOTONIC_RAW) {
            return (ts.tv_sec() as u64) * 1_000_000_000 + (ts.tv_nsec() as u64);
        }
    }
    // Fallback portable monotonic
    use std::time::Instant;
    static START: once_cell::sync::Lazy<Instant> = once_cell::sync::Lazy::new(Instant::now);
    START.elapsed().as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(b >= a);
    }

    #[test]
    fn shutdown_flag_latches() {
        let f = ShutdownFlag::default();
        assert!(!f.is_raised());
        f.raise();
        assert!(f.is_raised());
    }
}
