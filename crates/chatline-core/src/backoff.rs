//! Reconnection delay schedule.
//!
//! Exponential growth with randomized jitter, the same curve the Socket.IO
//! client uses: `delay = initial * 2^attempt`, shifted up or down by up to
//! `randomization_factor * delay`, then clamped into `[initial, max]`.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Growth factor between successive attempts.
pub const BACKOFF_FACTOR: u32 = 2;

/// Jittered exponential backoff.
///
/// The RNG is seeded once at construction so a simulation with a fixed seed
/// replays the exact same delays.
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    jitter: f64,
    rng: ChaCha8Rng,
}

impl Backoff {
    /// Create a schedule. `max` below `min` is raised to `min`, and `jitter`
    /// is clamped into `[0, 1]`.
    pub fn new(min: Duration, max: Duration, jitter: f64, seed: u64) -> Self {
        let jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };
        Self { min, max: max.max(min), jitter, rng: ChaCha8Rng::seed_from_u64(seed) }
    }

    /// Delay before the given zero-based attempt.
    pub fn delay(&mut self, attempt: u32) -> Duration {
        let min_ms = self.min.as_millis() as f64;
        let max_ms = self.max.as_millis() as f64;

        let mut ms = min_ms * f64::from(BACKOFF_FACTOR).powi(attempt.min(31) as i32);
        if self.jitter > 0.0 {
            let sample: f64 = self.rng.gen_range(0.0..1.0);
            let deviation = (sample * self.jitter * ms).floor();
            if ((sample * 10.0).floor() as u64) & 1 == 0 {
                ms -= deviation;
            } else {
                ms += deviation;
            }
        }

        Duration::from_millis(ms.clamp(min_ms, max_ms) as u64)
    }
}
