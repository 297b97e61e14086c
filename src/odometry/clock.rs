use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

#[cfg(test)]
#[path = "clock_tests.rs"]
mod clock_tests;

/// Defines a source of timestamps, in seconds.
///
/// Timestamps from the same clock are comparable. The origin of the clock is arbitrary.
pub trait Clock: Send + Sync {
    /// Returns the current time in seconds.
    fn now_seconds(&self) -> f64;
}

/// A [Clock] that reports the time since it was created, based on [Instant].
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a new [MonotonicClock] that starts at zero.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_seconds(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A [Clock] that only moves when told to. Used for simulation and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// The bit pattern of the current time as an f64.
    seconds: AtomicU64,
}

impl ManualClock {
    /// Moves the clock forward by `seconds`.
    pub fn advance(&self, seconds: f64) {
        let _ = self
            .seconds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
                Some((f64::from_bits(bits) + seconds).to_bits())
            });
    }

    /// Creates a new [ManualClock] at the given time.
    pub fn new(seconds: f64) -> Self {
        Self {
            seconds: AtomicU64::new(seconds.to_bits()),
        }
    }

    /// Sets the clock to the given time.
    pub fn set(&self, seconds: f64) {
        self.seconds.store(seconds.to_bits(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_seconds(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::SeqCst))
    }
}
