//! Property-based simulation tests.
//!
//! Random sequences of network faults and chat traffic run against one
//! joined client. The standard invariants are checked after every step, and
//! once the faults stop the session must recover with its identity intact.

use std::time::Duration;

use chatline_app::UserIntent;
use chatline_core::{ConnectionConfig, ConnectionState, MemoryIdentityStore};
use chatline_harness::{SimServer, Simulation};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Drop,
    Wait(u64),
    Send(String),
    Outage(bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Drop),
        3 => (50u64..3_000).prop_map(Op::Wait),
        3 => "[a-z]{1,12}".prop_map(Op::Send),
        1 => any::<bool>().prop_map(Op::Outage),
    ]
}

fn config() -> ConnectionConfig {
    ConnectionConfig {
        reconnection_attempts: 4,
        reconnection_delay: Duration::from_millis(100),
        reconnection_delay_max: Duration::from_millis(800),
        connect_timeout: Duration::from_secs(1),
        ..ConnectionConfig::default()
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().unwrap()
}

async fn run_ops(seed: u64, ops: Vec<Op>) -> Simulation {
    let server = SimServer::new().with_heartbeat(Duration::from_secs(1), Duration::from_secs(1));
    let mut sim = Simulation::new(seed, server, MemoryIdentityStore::new(), config());
    sim.start().await.unwrap();
    assert!(sim.run_until_state(ConnectionState::Connected).await.unwrap());
    sim.perform(UserIntent::Join("alice".into())).await.unwrap();

    for op in ops {
        match op {
            Op::Drop => {
                sim.drop_connection();
            },
            Op::Wait(ms) => sim.run_for(Duration::from_millis(ms)).await.unwrap(),
            Op::Send(text) => sim.perform(UserIntent::SendMessage(text)).await.unwrap(),
            Op::Outage(down) => sim.with_server(|server| server.set_unreachable(down)),
        }
        sim.settle().await.unwrap();
    }

    sim.with_server(|server| server.set_unreachable(false));
    sim.run_for(Duration::from_secs(10)).await.unwrap();
    if sim.app().connection_state() == ConnectionState::DisconnectedPermanent {
        sim.perform(UserIntent::Reconnect).await.unwrap();
    }
    sim.run_until_state(ConnectionState::Connected).await.unwrap();
    sim.settle().await.unwrap();
    sim
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_session_survives_faults(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 0..24),
    ) {
        let sim = runtime().block_on(run_ops(seed, ops));

        prop_assert_eq!(sim.app().connection_state(), ConnectionState::Connected);
        prop_assert!(sim.app().joined());
        prop_assert_eq!(sim.app().username(), "alice");
        prop_assert_eq!(sim.store().peek(), Some("alice".to_string()));
        prop_assert!(sim.bridge().connection().attempts() <= 4);

        // The server knows the user again after the final restore
        let users = sim.with_server(|server| server.users().to_vec());
        prop_assert_eq!(users, vec!["alice".to_string()]);
    }

    #[test]
    fn prop_epoch_counts_connections(
        seed in any::<u64>(),
        drops in 0usize..5,
    ) {
        let sim = runtime().block_on(run_ops(seed, vec![Op::Drop; drops]));

        let opened = sim.with_server(|server| server.opened().len());
        prop_assert_eq!(sim.app().epoch(), opened as u64);
    }
}
