// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Time source abstraction so expiry can be controlled in tests.

#[cfg(any(feature = "test-util", test))]
use std::sync::Arc;
use std::time::SystemTime;
#[cfg(any(feature = "test-util", test))]
use std::time::Duration;

#[cfg(any(feature = "test-util", test))]
use parking_lot::Mutex;

/// Provides the cache's notion of "now".
///
/// In production the clock reads the system time. With the `test-util`
/// feature enabled, [`Clock::frozen`] creates a clock whose time only moves
/// when [`Clock::advance`] is called, which makes TTL behavior fast and
/// deterministic to test.
///
/// Cloning a clock is cheap and every clone shares the same underlying
/// state; advancing one frozen clone is visible to all others.
#[derive(Clone, Debug)]
pub struct Clock(Inner);

#[derive(Clone, Debug)]
enum Inner {
    System,
    #[cfg(any(feature = "test-util", test))]
    Frozen(Arc<Mutex<SystemTime>>),
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl Clock {
    /// Creates a clock backed by the system time.
    #[must_use]
    pub const fn system() -> Self {
        Self(Inner::System)
    }

    /// Creates a clock frozen at the current system time.
    ///
    /// Time only moves through [`Clock::advance`].
    #[cfg(any(feature = "test-util", test))]
    #[must_use]
    pub fn frozen() -> Self {
        Self(Inner::Frozen(Arc::new(Mutex::new(SystemTime::now()))))
    }

    /// Moves a frozen clock forward by `delta`.
    ///
    /// Has no effect on a system clock.
    #[cfg(any(feature = "test-util", test))]
    pub fn advance(&self, delta: Duration) {
        if let Inner::Frozen(now) = &self.0 {
            let mut now = now.lock();
            *now += delta;
        }
    }

    /// Returns the current time according to this clock.
    #[must_use]
    pub fn now(&self) -> SystemTime {
        match &self.0 {
            Inner::System => SystemTime::now(),
            #[cfg(any(feature = "test-util", test))]
            Inner::Frozen(now) => *now.lock(),
        }
    }
}
