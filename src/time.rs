// Defines the time source abstraction consumed by the stateful PID controller
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use core::cell::Cell;

use num_traits::float::FloatCore;

/// A source of timestamps, expressed in fractional seconds since an arbitrary epoch.
///
/// The stateful PID controller reads its time source once per update while in automatic mode, and
/// never while in manual mode. Readings should be non-decreasing over the lifetime of a
/// controller: a reading that goes backwards yields a non-positive elapsed time and the update is
/// skipped.
///
/// Any `FnMut() -> F` closure is a time source, so most callers never implement this trait by
/// hand.
pub trait TimeSource<F> {
    /// Returns the current time in seconds
    fn now(&mut self) -> F;
}

impl<F, T> TimeSource<F> for T
where
    T: FnMut() -> F,
{
    fn now(&mut self) -> F {
        self()
    }
}

/// A clock that only moves when told to.
///
/// Intended for tests, simulations and replaying recorded data. The clock uses interior
/// mutability so that a controller can hold a shared reference to it while the caller keeps
/// advancing it:
///
/// ```rust
/// use feedback_pid::pid::{PidConfig, PidController};
/// use feedback_pid::time::ManualClock;
///
/// let clock = ManualClock::new(0.0);
/// let mut pid = PidController::new(PidConfig::default(), &clock);
///
/// let _ = pid.update(0.5, None);
/// clock.advance(0.1);
/// let _ = pid.update(0.6, None);
/// assert_eq!(pid.last_time(), Some(0.1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock<F: Copy> {
    seconds: Cell<F>,
}

impl<F: FloatCore> ManualClock<F> {
    /// Creates a clock reading `start` seconds
    pub fn new(start: F) -> Self {
        Self {
            seconds: Cell::new(start),
        }
    }

    /// Returns the current reading without advancing the clock
    pub fn get(&self) -> F {
        self.seconds.get()
    }

    /// Moves the clock to an absolute reading. Moving it backwards is allowed and makes the next
    /// automatic update a no-op.
    pub fn set(&self, seconds: F) {
        self.seconds.set(seconds);
    }

    /// Moves the clock forward by `seconds`
    pub fn advance(&self, seconds: F) {
        self.seconds.set(self.seconds.get() + seconds);
    }
}

impl<F: FloatCore> TimeSource<F> for &ManualClock<F> {
    fn now(&mut self) -> F {
        self.get()
    }
}

#[cfg(feature = "std")]
mod monotonic {

    use super::TimeSource;

    /// A wall-clock time source backed by `std::time::Instant`, reading seconds elapsed since the
    /// clock was created. It is never used implicitly; pass it to the controller explicitly.
    #[derive(Debug, Clone, Copy)]
    pub struct MonotonicClock {
        epoch: std::time::Instant,
    }

    impl MonotonicClock {
        /// Starts a clock reading zero seconds now
        pub fn new() -> Self {
            MonotonicClock {
                epoch: std::time::Instant::now(),
            }
        }

        /// Seconds elapsed since the clock was created
        pub fn elapsed_secs(&self) -> f64 {
            self.epoch.elapsed().as_secs_f64()
        }
    }

    impl Default for MonotonicClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TimeSource<f64> for MonotonicClock {
        fn now(&mut self) -> f64 {
            self.elapsed_secs()
        }
    }

    impl TimeSource<f32> for MonotonicClock {
        fn now(&mut self) -> f32 {
            self.epoch.elapsed().as_secs_f32()
        }
    }

    /// Tests that the monotonic clock starts near zero and never runs backwards
    #[cfg(test)]
    #[test]
    fn test_monotonic_clock_is_non_decreasing() {
        let mut clock = MonotonicClock::new();
        let first: f64 = clock.now();
        let second: f64 = clock.now();
        assert!(first >= 0.0);
        assert!(second >= first);
    }
}

#[cfg(feature = "std")]
pub use monotonic::MonotonicClock;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closures_are_time_sources() {
        let mut ticks = 0.0_f64;
        let mut source = || {
            ticks += 0.5;
            ticks
        };
        assert_eq!(TimeSource::now(&mut source), 0.5);
        assert_eq!(TimeSource::now(&mut source), 1.0);
    }

    #[test]
    fn test_manual_clock_moves_only_on_request() {
        let clock = ManualClock::new(2.0_f64);
        let mut source = &clock;
        assert_eq!(source.now(), 2.0);
        assert_eq!(source.now(), 2.0);

        clock.advance(0.25);
        assert_eq!(source.now(), 2.25);

        clock.set(1.0);
        assert_eq!(source.now(), 1.0);
    }
}
