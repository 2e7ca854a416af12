//! Time management for edge devices
//!
//! Provides a clock abstraction so the pipeline can run against different
//! time sources:
//! - System monotonic clock (when `std` is available)
//! - Hardware timer / RTOS tick (platform integration implements [`Clock`])
//! - Fixed, test-controlled time

use core::cell::Cell;

/// Timestamp in milliseconds since device boot (monotonic)
pub type Timestamp = u64;

/// Source of monotonic millisecond time
///
/// The pipeline only ever measures intervals and orders samples, so the
/// epoch is irrelevant - implementations must merely never go backwards.
pub trait Clock {
    /// Get current timestamp in milliseconds
    fn now_ms(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for alloc::rc::Rc<C> {
    fn now_ms(&self) -> Timestamp {
        (**self).now_ms()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> Timestamp {
        (**self).now_ms()
    }
}

/// Monotonic clock backed by `std::time::Instant`
///
/// Counts milliseconds since construction, immune to wall-clock adjustments.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now_ms(&self) -> Timestamp {
        self.start.elapsed().as_millis() as Timestamp
    }
}

/// Settable time source for deterministic tests
///
/// Interior mutability lets tests hold an `Rc<FixedClock>` and advance it
/// while the module under test owns another handle to the same clock.
#[derive(Debug)]
pub struct FixedClock {
    now: Cell<Timestamp>,
}

impl FixedClock {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            now: Cell::new(timestamp),
        }
    }

    pub fn set(&self, timestamp: Timestamp) {
        self.now.set(timestamp);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> Timestamp {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(1000);
        assert_eq!(clock.now_ms(), 1000);

        clock.advance(500);
        assert_eq!(clock.now_ms(), 1500);

        clock.set(10_000);
        assert_eq!(clock.now_ms(), 10_000);
    }

    #[test]
    fn shared_clock_handles() {
        let clock = alloc::rc::Rc::new(FixedClock::new(0));
        let handle: alloc::rc::Rc<FixedClock> = clock.clone();

        clock.advance(42);
        assert_eq!(handle.now_ms(), 42);
    }

    #[cfg(feature = "std")]
    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
