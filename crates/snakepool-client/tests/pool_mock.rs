//! Integration test: pooled sessions against the in-memory mock server.
//!
//! With the default 12x12 board every snake starts at (6, 6) heading right,
//! so six `Straight` broadcasts drive every slot into the right wall.

use snakepool_client::conformance::{EchoViolation, run_until_first_termination, step_and_check_echo};
use snakepool_client::pool::PoolStepper;
use snakepool_client::session::SlotStatus;
use snakepool_core::error::{ArgumentError, ClientError, ObsError, TransportError};
use snakepool_core::types::{Action, DeathCause, ObsKind};
use snakepool_test_utils::{
    Fault, MockServer, init_tracing, random_actions, seeded_rng, sequential_seeds,
};

const TOL: f64 = 1e-8;

fn drive_into_wall(stepper: &PoolStepper<'_>, session: &mut snakepool_client::Session) {
    for _ in 0..6 {
        stepper.broadcast(session, Action::Straight).unwrap();
    }
    assert!(session.all_terminated());
}

#[test]
fn reset_many_creates_one_live_slot_per_seed() {
    init_tracing();
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);

    let seeds = sequential_seeds(8);
    let session = stepper.reset_many(&seeds, ObsKind::Raycasts19).unwrap();

    assert_eq!(session.id(), "mock-0001");
    assert_eq!(session.len(), 8);
    assert_eq!(session.seeds(), seeds.as_slice());
    assert_eq!(session.obs_kind(), ObsKind::Raycasts19);
    assert_eq!(session.ticks(), 0);
    assert_eq!(session.live_count(), 8);
    for slot in session.slots() {
        assert_eq!(slot.status(), SlotStatus::Live);
        assert_eq!(slot.last_outcome().obs.as_dense().map(<[f32]>::len), Some(19));
    }
}

#[test]
fn broadcast_straight_hits_the_wall_on_tick_six() {
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);
    let mut session = stepper.reset_many(&sequential_seeds(4), ObsKind::Dense11).unwrap();

    for tick in 1..=5 {
        let report = stepper.broadcast(&mut session, Action::Straight).unwrap();
        assert_eq!(report.tick, tick);
        assert!(report.newly_terminated.is_empty());
        assert_eq!(report.live, 4);
    }
    let report = stepper.broadcast(&mut session, Action::Straight).unwrap();
    assert_eq!(report.tick, 6);
    assert_eq!(report.newly_terminated, vec![0, 1, 2, 3]);
    assert_eq!(report.live, 0);
    assert_eq!(server.calls("step_many"), 6);

    for slot in session.slots() {
        let outcome = slot.terminal_outcome().unwrap();
        assert_eq!(outcome.death, DeathCause::Wall);
        assert_eq!(outcome.steps, 6);
        assert!(outcome.signals.death() < 0.0);
    }
}

#[test]
fn per_slot_actions_reach_their_own_slot() {
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);
    let mut session = stepper.reset_many(&[10, 20], ObsKind::Dense32).unwrap();

    // Slot 1 circles in a 2x2 square and never reaches a wall.
    let mut last = None;
    for _ in 0..6 {
        last = Some(
            stepper
                .step_many(&mut session, &[Action::Straight, Action::TurnRight])
                .unwrap(),
        );
    }
    let report = last.unwrap();
    assert_eq!(report.newly_terminated, vec![0]);
    assert_eq!(report.live, 1);
    assert!(session.slot(0).unwrap().terminated());
    assert!(!session.slot(1).unwrap().terminated());
    assert_eq!(session.terminated_slots(), vec![0]);
}

#[test]
fn random_per_slot_actions_keep_slot_count() {
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);
    let mut session = stepper.reset_many(&sequential_seeds(5), ObsKind::Dense11).unwrap();
    let mut rng = seeded_rng(99);

    let mut terminated = 0;
    for tick in 1..=40 {
        let actions = random_actions(&mut rng, session.len());
        let report = stepper.step_many(&mut session, &actions).unwrap();
        assert_eq!(report.tick, tick);
        terminated += report.newly_terminated.len();
        assert_eq!(report.live, 5 - terminated);
        assert_eq!(session.terminated_count(), terminated);
    }
    assert_eq!(session.len(), 5);
}

#[test]
fn action_count_mismatch_is_rejected_before_io() {
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);
    let mut session = stepper.reset_many(&sequential_seeds(8), ObsKind::Dense11).unwrap();
    let before = session.clone();

    let err = stepper
        .step_many(&mut session, &[Action::Straight; 3])
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::InvalidArgument(ArgumentError::ActionCountMismatch { slots: 8, got: 3 })
    ));
    assert_eq!(server.calls("step_many"), 0);
    assert_eq!(session, before);
}

#[test]
fn empty_seed_list_is_rejected_before_io() {
    let server = MockServer::new();
    let err = PoolStepper::new(&server)
        .reset_many(&[], ObsKind::Dense11)
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidArgument(ArgumentError::EmptySeeds)));
    assert_eq!(server.total_calls(), 0);
}

#[test]
fn transport_failure_leaves_session_untouched() {
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);
    let mut session = stepper.reset_many(&sequential_seeds(3), ObsKind::Dense11).unwrap();
    stepper.broadcast(&mut session, Action::Straight).unwrap();
    let before = session.clone();

    server.inject(Fault::Timeout);
    let err = stepper.broadcast(&mut session, Action::Straight).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Timeout { operation: "step_many" })
    ));
    assert_eq!(session, before);

    server.inject(Fault::Unavailable);
    let err = stepper.broadcast(&mut session, Action::Straight).unwrap_err();
    assert!(matches!(err, ClientError::Transport(TransportError::Connect { .. })));
    assert_eq!(session, before);

    let report = stepper.broadcast(&mut session, Action::Straight).unwrap();
    assert_eq!(report.tick, 2);
}

#[test]
fn short_reply_is_malformed() {
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);
    let mut session = stepper.reset_many(&sequential_seeds(3), ObsKind::Dense11).unwrap();
    let before = session.clone();

    server.inject(Fault::DropEnv);
    let err = stepper.broadcast(&mut session, Action::Straight).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Observation(ObsError::MalformedObservation { field: "envs", .. })
    ));
    assert_eq!(session, before);

    server.inject(Fault::DropEnv);
    let err = stepper.reset_many(&sequential_seeds(3), ObsKind::Dense11).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Observation(ObsError::MalformedObservation { field: "envs", .. })
    ));
}

#[test]
fn bad_dense_arity_in_pool_reply_is_reported() {
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);
    server.inject(Fault::DenseLength(18));
    let err = stepper
        .reset_many(&sequential_seeds(2), ObsKind::Raycasts19)
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Observation(ObsError::ObsLengthMismatch {
            kind: ObsKind::Raycasts19,
            expected: 19,
            actual: 18,
        })
    ));
}

#[test]
fn session_ids_are_validated() {
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);

    server.inject(Fault::EmptySession);
    let err = stepper.reset_many(&[1], ObsKind::Dense11).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Observation(ObsError::MalformedObservation { field: "session", .. })
    ));

    let mut session = stepper.reset_many(&[1, 2], ObsKind::Dense11).unwrap();
    let before = session.clone();
    server.inject(Fault::ForeignSession);
    let err = stepper.reset_in_place(&mut session, &[3, 4]).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Observation(ObsError::MalformedObservation { field: "session", .. })
    ));
    assert_eq!(session, before);
}

#[test]
fn reset_in_place_keeps_id_and_revives_slots() {
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);
    let mut session = stepper.reset_many(&[1, 2], ObsKind::Dense28Ego).unwrap();
    drive_into_wall(&stepper, &mut session);
    let id = session.id().to_string();

    stepper.reset_in_place(&mut session, &[5, 6]).unwrap();
    assert_eq!(session.id(), id);
    assert_eq!(session.seeds(), &[5, 6]);
    assert_eq!(session.ticks(), 0);
    assert_eq!(session.live_count(), 2);
    assert!(session.slots().iter().all(|s| s.terminal_outcome().is_none()));
    assert_eq!(server.session_count(), 1);

    let err = stepper.reset_in_place(&mut session, &[7]).unwrap_err();
    assert!(matches!(
        err,
        ClientError::InvalidArgument(ArgumentError::SeedCountMismatch { expected: 2, got: 1 })
    ));
}

#[test]
fn terminated_slots_echo_their_terminal_outcome() {
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);
    let mut session = stepper.reset_many(&sequential_seeds(4), ObsKind::Raycasts19).unwrap();
    drive_into_wall(&stepper, &mut session);
    let terminals: Vec<_> = session
        .slots()
        .iter()
        .map(|s| s.terminal_outcome().unwrap().clone())
        .collect();

    for _ in 0..3 {
        let report = step_and_check_echo(&stepper, &mut session, &[Action::TurnLeft], TOL).unwrap();
        assert!(report.is_clean(), "{:?}", report.violations);
        assert_eq!(report.checked, vec![0, 1, 2, 3]);
        assert!(report.tick.newly_terminated.is_empty());
    }

    for (slot, terminal) in session.slots().iter().zip(&terminals) {
        let echo = slot.last_outcome();
        assert!(echo.done);
        assert!(echo.signals.is_zero(TOL));
        assert_eq!(echo.obs, terminal.obs);
        assert_eq!(echo.steps, terminal.steps);
        assert_eq!(slot.terminal_outcome(), Some(terminal));
    }
}

#[test]
fn noisy_echo_is_reported_but_not_fatal() {
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);
    let mut session = stepper.reset_many(&sequential_seeds(2), ObsKind::Dense11).unwrap();
    drive_into_wall(&stepper, &mut session);

    server.inject(Fault::NoisyEcho);
    let report = step_and_check_echo(&stepper, &mut session, &[Action::Straight], TOL).unwrap();
    assert_eq!(report.violations.len(), 2);
    for slot in &report.violations {
        assert!(matches!(
            slot.violations.as_slice(),
            [EchoViolation::NonZeroSignals { .. }]
        ));
    }
    assert_eq!(session.ticks(), 7);
    assert!(session.all_terminated());
}

#[test]
fn eight_slots_run_until_first_termination() {
    init_tracing();
    let server = MockServer::new();
    let stepper = PoolStepper::new(&server);
    let seeds: Vec<u64> = (1..=8).collect();
    let mut session = stepper.reset_many(&seeds, ObsKind::Raycasts19).unwrap();
    let mut rng = seeded_rng(42);

    let report = run_until_first_termination(&stepper, &mut session, &mut rng, 10_000)
        .unwrap()
        .expect("a random walk on a 12x12 board terminates");
    assert!(!report.newly_terminated.is_empty());
    assert_eq!(report.live + session.terminated_count(), 8);
    assert_eq!(session.ticks(), report.tick);
    for &slot in &report.newly_terminated {
        let outcome = session.slot(slot).unwrap().terminal_outcome().unwrap();
        assert!(outcome.death.is_terminal());
    }

    // One more broadcast: finished slots echo while their neighbours step.
    let terminated = session.terminated_slots();
    let echo = step_and_check_echo(&stepper, &mut session, &[Action::Straight], TOL).unwrap();
    assert!(echo.is_clean(), "{:?}", echo.violations);
    assert_eq!(echo.checked, terminated);
    assert_eq!(echo.tick.tick, report.tick + 1);
    for &slot in &terminated {
        let state = session.slot(slot).unwrap();
        assert_eq!(state.status(), SlotStatus::Terminated);
        assert!(state.last_outcome().done);
        assert!(state.last_outcome().signals.is_zero(TOL));
    }
}

#[test]
fn broadcast_is_deterministic_per_seed() {
    let run = || {
        let server = MockServer::new();
        let stepper = PoolStepper::new(&server);
        let mut session = stepper.reset_many(&[11, 12, 13], ObsKind::RawState).unwrap();
        let mut rng = seeded_rng(7);
        run_until_first_termination(&stepper, &mut session, &mut rng, 10_000).unwrap();
        session.outcomes().cloned().collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}
