//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use chatline_core::ConnectionState;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A joined session always has a non-blank username.
pub struct JoinedHasUsername;

impl Invariant for JoinedHasUsername {
    fn name(&self) -> &'static str {
        "JoinedHasUsername"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.joined && client.username.trim().is_empty() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("client {}: joined with blank username", client.id),
                });
            }
        }
        Ok(())
    }
}

/// The persisted username is the committed one.
///
/// Joined means the store holds exactly the username. Not joined means the
/// store is empty. Skipped while the store cannot be read.
pub struct PersistedIdentityAgrees;

impl Invariant for PersistedIdentityAgrees {
    fn name(&self) -> &'static str {
        "PersistedIdentityAgrees"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let Some(persisted) = &client.persisted else {
                continue;
            };
            let expected = client.joined.then(|| client.username.clone());
            if *persisted != expected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: store holds {persisted:?}, session expects {expected:?}",
                        client.id
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Session state mirrors the connection manager after every step.
pub struct ConnectionMirrored;

impl Invariant for ConnectionMirrored {
    fn name(&self) -> &'static str {
        "ConnectionMirrored"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.session_connection != client.connection {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: session shows {}, connection is {}",
                        client.id, client.session_connection, client.connection
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Reconnection never exceeds the cap, and a permanent disconnect schedules
/// nothing further.
pub struct ReconnectionBounded;

impl Invariant for ReconnectionBounded {
    fn name(&self) -> &'static str {
        "ReconnectionBounded"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.attempts > client.attempt_cap {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: {} attempts with cap {}",
                        client.id, client.attempts, client.attempt_cap
                    ),
                });
            }
            if client.connection == ConnectionState::DisconnectedPermanent && client.retry_pending {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("client {}: retry pending after giving up", client.id),
                });
            }
        }
        Ok(())
    }
}

/// A connected session knows its Socket.IO id.
pub struct ConnectedHasSocketId;

impl Invariant for ConnectedHasSocketId {
    fn name(&self) -> &'static str {
        "ConnectedHasSocketId"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.connection == ConnectionState::Connected && !client.has_socket_id {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("client {}: connected without a socket id", client.id),
                });
            }
        }
        Ok(())
    }
}

/// Connection epochs must never decrease.
pub struct EpochMonotonicity;

impl Invariant for EpochMonotonicity {
    fn name(&self) -> &'static str {
        "EpochMonotonicity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for window in client.epoch_history.windows(2) {
                if window[1] < window[0] {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {}: epoch decreased {} → {}",
                            client.id, window[0], window[1]
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The log belongs to the joined session.
///
/// Not joined means an empty log and user list. While joined, the log only
/// grows unless a history snapshot replaced it.
pub struct LogFollowsSession;

impl Invariant for LogFollowsSession {
    fn name(&self) -> &'static str {
        "LogFollowsSession"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if !client.joined {
                if !client.messages.is_empty() || !client.users.is_empty() {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {}: not joined but holds {} messages and {} users",
                            client.id,
                            client.messages.len(),
                            client.users.len()
                        ),
                    });
                }
                continue;
            }
            let Some(before) = &client.log_before else {
                continue;
            };
            if !client.log_replaced && !client.messages.starts_with(before) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: log of {} messages rewritten to {} without a snapshot",
                        client.id,
                        before.len(),
                        client.messages.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// The user list is the last `active-users` snapshot the session received.
pub struct UsersFollowSnapshot;

impl Invariant for UsersFollowSnapshot {
    fn name(&self) -> &'static str {
        "UsersFollowSnapshot"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let Some(expected) = &client.expected_users else {
                continue;
            };
            if client.users != *expected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: shows {:?}, last snapshot was {expected:?}",
                        client.id, client.users
                    ),
                });
            }
        }
        Ok(())
    }
}

/// At most one transport per client is open at a time.
pub struct SingleTransport;

impl Invariant for SingleTransport {
    fn name(&self) -> &'static str {
        "SingleTransport"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.open_transports > 1 {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: {} transports open",
                        client.id, client.open_transports
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chatline_core::Message;

    use super::*;
    use crate::invariants::ClientSnapshot;

    fn client() -> ClientSnapshot {
        ClientSnapshot { id: 1, attempt_cap: 5, persisted: Some(None), ..Default::default() }
    }

    fn check(invariant: &dyn Invariant, client: ClientSnapshot) -> InvariantResult {
        invariant.check(&SystemSnapshot::single(client))
    }

    #[test]
    fn blank_joined_username_violates() {
        let bad = ClientSnapshot { joined: true, username: "  ".into(), ..client() };
        assert!(check(&JoinedHasUsername, bad).is_err());
    }

    #[test]
    fn store_must_follow_the_join_flag() {
        let joined = ClientSnapshot {
            joined: true,
            username: "alice".into(),
            persisted: Some(Some("alice".into())),
            ..client()
        };
        assert!(check(&PersistedIdentityAgrees, joined.clone()).is_ok());

        let stale = ClientSnapshot { joined: false, username: String::new(), ..joined };
        assert!(check(&PersistedIdentityAgrees, stale).is_err());

        let unreadable = ClientSnapshot { joined: true, username: "bob".into(), persisted: None, ..client() };
        assert!(check(&PersistedIdentityAgrees, unreadable).is_ok());
    }

    #[test]
    fn attempts_over_cap_violate() {
        let over = ClientSnapshot { attempts: 6, ..client() };
        assert!(check(&ReconnectionBounded, over).is_err());

        let lingering = ClientSnapshot {
            connection: ConnectionState::DisconnectedPermanent,
            retry_pending: true,
            ..client()
        };
        assert!(check(&ReconnectionBounded, lingering).is_err());
    }

    #[test]
    fn mirrored_states_must_agree() {
        let split = ClientSnapshot {
            session_connection: ConnectionState::Connected,
            connection: ConnectionState::Reconnecting,
            ..client()
        };
        assert!(check(&ConnectionMirrored, split).is_err());
    }

    #[test]
    fn decreasing_epoch_violates() {
        let client = client().with_epoch_history(vec![0, 1, 1, 0]);
        assert!(check(&EpochMonotonicity, client).is_err());
    }

    #[test]
    fn unjoined_session_must_be_empty() {
        let leftover = ClientSnapshot { messages: vec![Message::new("bob", "hi")], ..client() };
        assert!(check(&LogFollowsSession, leftover).is_err());

        let users = ClientSnapshot { users: vec!["bob".into()], ..client() };
        assert!(check(&LogFollowsSession, users).is_err());

        assert!(check(&LogFollowsSession, client()).is_ok());
    }

    #[test]
    fn joined_log_only_grows_between_snapshots() {
        let first = Message::new("bob", "one");
        let second = Message::new("bob", "two");
        let joined = ClientSnapshot { joined: true, username: "alice".into(), ..client() };

        let grown = ClientSnapshot { messages: vec![first.clone(), second.clone()], ..joined.clone() }
            .with_log_before(Some(vec![first.clone()]), false);
        assert!(check(&LogFollowsSession, grown).is_ok());

        let rewritten = ClientSnapshot { messages: vec![second], ..joined }
            .with_log_before(Some(vec![first.clone()]), false);
        assert!(check(&LogFollowsSession, rewritten.clone()).is_err());

        let replaced = rewritten.with_log_before(Some(vec![first]), true);
        assert!(check(&LogFollowsSession, replaced).is_ok());
    }

    #[test]
    fn users_must_match_the_last_snapshot() {
        let shown = ClientSnapshot { users: vec!["alice".into(), "bob".into()], ..client() };
        assert!(check(&UsersFollowSnapshot, shown.clone()).is_ok());

        let stale = shown.clone().with_expected_users(vec!["alice".into()]);
        assert!(check(&UsersFollowSnapshot, stale).is_err());

        let current = shown.with_expected_users(vec!["alice".into(), "bob".into()]);
        assert!(check(&UsersFollowSnapshot, current).is_ok());
    }

    #[test]
    fn two_open_transports_violate() {
        assert!(check(&SingleTransport, client().with_open_transports(1)).is_ok());
        assert!(check(&SingleTransport, client().with_open_transports(2)).is_err());
    }
}
