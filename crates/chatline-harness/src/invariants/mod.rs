//! Session invariants checked after every simulation step.
//!
//! A [`SystemSnapshot`] copies what the App and Bridge expose. Each
//! [`Invariant`] inspects the snapshot and reports a [`Violation`] when a
//! session property breaks, wherever in the run it happens.
//!
//! ```ignore
//! let snapshot = SystemSnapshot::single(ClientSnapshot::capture(0, &app, &bridge));
//! InvariantRegistry::standard().assert_all(&snapshot, "after reconnect");
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    ConnectedHasSocketId, ConnectionMirrored, EpochMonotonicity, JoinedHasUsername,
    LogFollowsSession, PersistedIdentityAgrees, ReconnectionBounded, SingleTransport,
    UsersFollowSnapshot,
};
pub use snapshot::{ClientSnapshot, SystemSnapshot};

/// Outcome of one invariant check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Which invariant broke
    pub invariant: &'static str,
    /// The offending client and values
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A session property that holds in every reachable state.
pub trait Invariant: Send + Sync {
    /// Name used in violation reports.
    fn name(&self) -> &'static str;

    /// Inspect `state`.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of invariants run together.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl fmt::Debug for InvariantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.invariants.iter().map(|inv| inv.name())).finish()
    }
}

impl InvariantRegistry {
    /// Registry with nothing to check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every session invariant this crate defines.
    pub fn standard() -> Self {
        Self::new()
            .with(JoinedHasUsername)
            .with(PersistedIdentityAgrees)
            .with(ConnectionMirrored)
            .with(ReconnectionBounded)
            .with(ConnectedHasSocketId)
            .with(EpochMonotonicity)
            .with(LogFollowsSession)
            .with(UsersFollowSnapshot)
            .with(SingleTransport)
    }

    /// Builder form of [`InvariantRegistry::add`].
    #[must_use]
    pub fn with<I: Invariant + 'static>(mut self, invariant: I) -> Self {
        self.add(invariant);
        self
    }

    /// Register `invariant`.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every invariant. Collects all violations rather than stopping at
    /// the first.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every invariant and panic with all violations and `context`.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let report: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("invariants broken {context}:\n  {}", report.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
