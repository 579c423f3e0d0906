// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Delay generation between retry attempts.

use std::cmp::min;
use std::time::Duration;

use crate::rnd::Rnd;

/// The fraction of the computed delay that jitter may shift it by, in
/// either direction.
const JITTER_FACTOR: f64 = 0.5;

/// Shape of the delay sequence between attempts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Backoff {
    /// The same delay before every retry.
    Constant,

    /// Delay grows by `base_delay` per attempt.
    Linear,

    /// Delay doubles per attempt: `base`, `2*base`, `4*base`, ...
    #[default]
    Exponential,
}

/// Computed delay plan: backoff shape plus base/cap/jitter parameters.
#[derive(Clone, Debug)]
pub(crate) struct Schedule {
    pub backoff: Backoff,
    pub base_delay: Duration,
    pub max_delay: Option<Duration>,
    pub jitter: bool,
    pub rnd: Rnd,
}

impl Schedule {
    /// Returns the infinite sequence of delays, one per retry.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        DelaysIter {
            schedule: self.clone(),
            attempt: 0,
        }
    }
}

#[derive(Debug)]
struct DelaysIter {
    schedule: Schedule,
    attempt: u32,
}

impl Iterator for DelaysIter {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        // Zero base delay => always zero, jitter or not.
        if self.schedule.base_delay.is_zero() {
            return Some(Duration::ZERO);
        }

        let base = self.schedule.base_delay;
        let raw = match self.schedule.backoff {
            Backoff::Constant => base,
            Backoff::Linear => base.saturating_mul(self.attempt.saturating_add(1)),
            Backoff::Exponential => duration_mul_pow2(base, self.attempt),
        };

        let delay = if self.schedule.jitter {
            apply_jitter(raw, &self.schedule.rnd)
        } else {
            raw
        };

        self.attempt = self.attempt.saturating_add(1);
        Some(clamp_to_max(delay, self.schedule.max_delay))
    }
}

fn clamp_to_max(d: Duration, max: Option<Duration>) -> Duration {
    max.map_or(d, |m| min(d, m))
}

fn duration_mul_pow2(base: Duration, attempt: u32) -> Duration {
    let factor = 2.0f64.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
    secs_to_duration_saturating(base.as_secs_f64() * factor)
}

/// Adds a symmetric, uniform jitter centered on the given delay.
///
/// With `JITTER_FACTOR = 0.5`, the result lies in `[0.75*delay, 1.25*delay]`.
#[inline]
fn apply_jitter(delay: Duration, rnd: &Rnd) -> Duration {
    let secs = delay.as_secs_f64();
    let offset = (secs * JITTER_FACTOR).mul_add(rnd.next_f64(), -(secs * JITTER_FACTOR) / 2.0);
    secs_to_duration_saturating(secs + offset)
}

fn secs_to_duration_saturating(secs: f64) -> Duration {
    if secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
