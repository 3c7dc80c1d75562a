pub mod clock {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Instant;

    pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

    /// Frequency of the delay and sound timers.
    pub const TIMER_HZ: u64 = 60;

    /// Wall-clock source the interpreter reads for timers and pacing.
    /// Readings are nanoseconds since an arbitrary, fixed epoch.
    pub trait Clock {
        fn now(&self) -> u64;
    }

    /// Monotonic clock anchored when it was created.
    pub struct SystemClock {
        epoch: Instant,
    }

    impl SystemClock {
        pub fn new() -> SystemClock {
            SystemClock {
                epoch: Instant::now(),
            }
        }
    }

    impl Default for SystemClock {
        fn default() -> SystemClock {
            SystemClock::new()
        }
    }

    impl Clock for SystemClock {
        fn now(&self) -> u64 {
            self.epoch.elapsed().as_nanos() as u64
        }
    }

    /// A clock that only moves when told to. Clones share the same time,
    /// so a test can keep a handle while the VM owns another.
    #[derive(Clone, Default)]
    pub struct ManualClock {
        nanos: Rc<Cell<u64>>,
    }

    impl ManualClock {
        pub fn new() -> ManualClock {
            ManualClock::default()
        }

        pub fn set(&self, nanos: u64) {
            self.nanos.set(nanos);
        }

        pub fn advance(&self, nanos: u64) {
            self.nanos.set(self.nanos.get() + nanos);
        }

        /// Advance by a number of 60Hz timer ticks.
        pub fn advance_ticks(&self, ticks: u64) {
            self.advance(ticks * NANOS_PER_SECOND / TIMER_HZ);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> u64 {
            self.nanos.get()
        }
    }
}
