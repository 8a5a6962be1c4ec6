//! Integration test: conformance against a running env server.
//!
//! Skipped unless `SNAKEPOOL_REST_URL` and/or `SNAKEPOOL_GRPC_ENDPOINT`
//! point at a live server, e.g.
//!
//! ```text
//! SNAKEPOOL_REST_URL=http://localhost:8080/v1 \
//! SNAKEPOOL_GRPC_ENDPOINT=http://localhost:50051 \
//!     cargo test -p snakepool-client --test live_conformance
//! ```

use snakepool_client::conformance::{
    cross_transport_parity, reset_determinism, run_until_first_termination, step_and_check_echo,
};
use snakepool_client::pool::PoolStepper;
use snakepool_client::transport::Transport;
use snakepool_client::{GrpcTransport, RestTransport};
use snakepool_core::config::ClientConfig;
use snakepool_core::determinism::DeterminismVerifier;
use snakepool_core::types::{Action, ObsKind};
use snakepool_test_utils::{init_tracing, seeded_rng};

const SEED: u64 = 123_456_789;
const ECHO_TOL: f64 = 1e-8;

fn rest() -> Option<RestTransport> {
    let url = std::env::var("SNAKEPOOL_REST_URL").ok()?;
    let config = ClientConfig {
        rest_url: url,
        ..ClientConfig::default()
    };
    Some(RestTransport::new(&config).unwrap())
}

fn grpc() -> Option<GrpcTransport> {
    let endpoint = std::env::var("SNAKEPOOL_GRPC_ENDPOINT").ok()?;
    let config = ClientConfig {
        grpc_endpoint: endpoint,
        ..ClientConfig::default()
    };
    Some(GrpcTransport::connect(&config).unwrap())
}

fn live_transports() -> Vec<Box<dyn Transport>> {
    let mut transports: Vec<Box<dyn Transport>> = Vec::new();
    if let Some(rest) = rest() {
        transports.push(Box::new(rest));
    }
    if let Some(grpc) = grpc() {
        transports.push(Box::new(grpc));
    }
    transports
}

#[test]
fn reset_is_deterministic_on_each_transport() {
    init_tracing();
    let verifier = DeterminismVerifier::default();
    for transport in live_transports() {
        let spec = transport.get_spec().unwrap();
        for kind in spec.supported_obs {
            let report = reset_determinism(transport.as_ref(), SEED, kind, &verifier).unwrap();
            assert!(
                report.is_equal(),
                "{} {kind}: {:?}",
                transport.name(),
                report.mismatch
            );
        }
    }
}

#[test]
fn transports_agree_on_reset() {
    let (Some(rest), Some(grpc)) = (rest(), grpc()) else {
        return;
    };
    let verifier = DeterminismVerifier::default();
    let spec = rest.get_spec().unwrap();
    assert_eq!(spec, grpc.get_spec().unwrap());
    for kind in spec.supported_obs {
        let report = cross_transport_parity(&rest, &grpc, SEED, kind, &verifier).unwrap();
        assert!(report.is_equal(), "{kind}: {:?}", report.mismatch);
    }
}

#[test]
fn pooled_echoes_hold_after_termination() {
    init_tracing();
    for transport in live_transports() {
        let stepper = PoolStepper::new(transport.as_ref());
        let seeds: Vec<u64> = (1..=8).collect();
        let mut session = stepper.reset_many(&seeds, ObsKind::Raycasts19).unwrap();
        let mut rng = seeded_rng(SEED);

        let report = run_until_first_termination(&stepper, &mut session, &mut rng, 5_000)
            .unwrap()
            .expect("some slot terminates within 5000 ticks");
        assert!(!report.newly_terminated.is_empty());

        for _ in 0..3 {
            let echo =
                step_and_check_echo(&stepper, &mut session, &[Action::Straight], ECHO_TOL).unwrap();
            assert!(echo.is_clean(), "{}: {:?}", transport.name(), echo.violations);
        }
    }
}
