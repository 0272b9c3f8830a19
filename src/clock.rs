use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source for the motion stepper. Injected so the timed
/// interpolation mode and settle loops run against a controllable clock in
/// tests instead of wall time.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed epoch.
    fn now(&self) -> Duration;
}

/// Wall-clock implementation, anchored at construction.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

struct FakeState {
    now: Duration,
    auto_tick: Duration,
}

/// Hand-cranked clock for tests. `advance` moves time explicitly; a nonzero
/// `auto_tick` additionally steps time forward on every `now()` query, which
/// lets busy-poll loops observe progress and terminate.
pub struct FakeClock {
    state: Mutex<FakeState>,
}

impl FakeClock {
    pub fn new() -> Self {
        FakeClock {
            state: Mutex::new(FakeState {
                now: Duration::ZERO,
                auto_tick: Duration::ZERO,
            }),
        }
    }

    pub fn with_auto_tick(tick: Duration) -> Self {
        FakeClock {
            state: Mutex::new(FakeState {
                now: Duration::ZERO,
                auto_tick: tick,
            }),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.state.lock().now += by;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        FakeClock::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        let mut state = self.state.lock();
        let tick = state.auto_tick;
        state.now += tick;
        state.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_only_on_demand() {
        let clock = FakeClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(25));
        assert_eq!(clock.now(), Duration::from_millis(25));
        assert_eq!(clock.now(), Duration::from_millis(25));
    }

    #[test]
    fn auto_tick_steps_each_query() {
        let clock = FakeClock::with_auto_tick(Duration::from_millis(10));
        assert_eq!(clock.now(), Duration::from_millis(10));
        assert_eq!(clock.now(), Duration::from_millis(20));
        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.now(), Duration::from_millis(35));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
