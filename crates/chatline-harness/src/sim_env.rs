//! Virtual-time environment.
//!
//! Time only moves when the simulation says so. Randomness comes from a
//! seeded ChaCha8 stream, so a seed fixes every backoff delay of a run.

#![allow(clippy::disallowed_types, reason = "Synchronous locking of clock and RNG only")]

use std::{
    future::Future,
    ops::{Add, Sub},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chatline_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A point on the virtual clock, measured from the start of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Start of the simulation.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Time since the start of the simulation.
    pub fn since_start(self) -> Duration {
        self.0
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

struct SimInner {
    now: SimInstant,
    rng: ChaCha8Rng,
}

/// Simulation environment. Clones share one clock and one RNG.
#[derive(Clone)]
pub struct SimEnv {
    inner: Arc<Mutex<SimInner>>,
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("now", &self.lock().now).finish_non_exhaustive()
    }
}

impl SimEnv {
    /// Environment at time zero with RNG seeded from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        let inner = SimInner { now: SimInstant::ZERO, rng: ChaCha8Rng::seed_from_u64(seed) };
        Self { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut inner = self.lock();
        inner.now = inner.now + duration;
    }

    /// Time since the start of the simulation.
    pub fn elapsed(&self) -> Duration {
        self.lock().now.since_start()
    }

    fn lock(&self) -> MutexGuard<'_, SimInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        self.lock().now
    }

    /// Advances the virtual clock and completes immediately.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.lock().rng.fill_bytes(buffer);
    }
}
