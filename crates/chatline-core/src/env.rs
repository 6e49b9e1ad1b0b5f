//! Time and randomness behind a trait.
//!
//! Session code never reads the clock or the OS RNG directly. The production
//! client plugs in the host clock and the simulation harness plugs in a
//! virtual clock with a seeded RNG, so a failing simulation replays exactly.

use std::time::Duration;

/// Clock, entropy, and sleeping for one client.
///
/// `now()` is monotonic. Nothing here fails in normal operation.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Point in time. `std::time::Instant` in production, virtual time in
    /// simulation.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current instant.
    fn now(&self) -> Self::Instant;

    /// Wait for `duration`. State machines never call this; they take `now`
    /// as an argument.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes. Seeded environments repeat the same
    /// bytes for the same seed.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64`, used to seed reconnection jitter.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
