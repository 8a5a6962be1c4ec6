//! Reusable conformance checks against a live or mock server.
//!
//! The helpers here perform the I/O; the comparison itself is delegated to
//! [`DeterminismVerifier`] and [`check_echo`].

use rand::Rng;
use thiserror::Error;

use snakepool_core::codec::ObsMismatch;
use snakepool_core::determinism::DeterminismVerifier;
use snakepool_core::error::ClientError;
use snakepool_core::types::{Action, DeathCause, ObsKind, Signals, StepOutcome};

use crate::pool::{PoolStepper, TickReport};
use crate::session::Session;
use crate::transport::Transport;

/// Tolerance for "signal is zero" in echoed outcomes.
pub const DEFAULT_ECHO_TOLERANCE: f64 = 1e-8;

// ---------------------------------------------------------------------------
// Echo contract
// ---------------------------------------------------------------------------

/// One way an echoed outcome differs from what the echo contract requires.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EchoViolation {
    #[error("echoed outcome is not done")]
    NotDone,

    #[error("echoed signals are not zero: {signals:?}")]
    NonZeroSignals { signals: Signals },

    #[error("score changed from {before} to {after}")]
    ScoreChanged { before: u32, after: u32 },

    #[error("length changed from {before} to {after}")]
    LengthChanged { before: u32, after: u32 },

    #[error("death cause changed from '{before}' to '{after}'")]
    DeathChanged {
        before: DeathCause,
        after: DeathCause,
    },

    #[error("step count changed from {before} to {after}")]
    StepsChanged { before: u32, after: u32 },
}

/// Compare an echoed outcome against the slot's terminal outcome.
///
/// Returns every violation found; an empty vector means the echo is
/// well-formed.
pub fn check_echo(terminal: &StepOutcome, echo: &StepOutcome, tol: f64) -> Vec<EchoViolation> {
    let mut violations = Vec::new();
    if !echo.done {
        violations.push(EchoViolation::NotDone);
    }
    if !echo.signals.is_zero(tol) {
        violations.push(EchoViolation::NonZeroSignals {
            signals: echo.signals,
        });
    }
    if echo.score != terminal.score {
        violations.push(EchoViolation::ScoreChanged {
            before: terminal.score,
            after: echo.score,
        });
    }
    if echo.length != terminal.length {
        violations.push(EchoViolation::LengthChanged {
            before: terminal.length,
            after: echo.length,
        });
    }
    if echo.death != terminal.death {
        violations.push(EchoViolation::DeathChanged {
            before: terminal.death,
            after: echo.death,
        });
    }
    if echo.steps != terminal.steps {
        violations.push(EchoViolation::StepsChanged {
            before: terminal.steps,
            after: echo.steps,
        });
    }
    violations
}

/// Echo violations of one slot on one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotEcho {
    pub slot: usize,
    pub violations: Vec<EchoViolation>,
}

/// Result of [`step_and_check_echo`].
#[derive(Debug, Clone, PartialEq)]
pub struct EchoReport {
    pub tick: TickReport,
    /// Slots that were already terminated before the tick.
    pub checked: Vec<usize>,
    /// Only slots with at least one violation.
    pub violations: Vec<SlotEcho>,
}

impl EchoReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Step `session` once and check every slot that was already terminated
/// beforehand against its terminal outcome.
pub fn step_and_check_echo(
    stepper: &PoolStepper<'_>,
    session: &mut Session,
    actions: &[Action],
    tol: f64,
) -> Result<EchoReport, ClientError> {
    let references: Vec<(usize, StepOutcome)> = session
        .slots()
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.terminal_outcome().map(|t| (i, t.clone())))
        .collect();

    let tick = stepper.step_many(session, actions)?;

    let checked = references.iter().map(|(i, _)| *i).collect();
    let violations = references
        .into_iter()
        .filter_map(|(slot, terminal)| {
            let echo = session.slot(slot)?.last_outcome();
            let violations = check_echo(&terminal, echo, tol);
            (!violations.is_empty()).then_some(SlotEcho { slot, violations })
        })
        .collect();

    Ok(EchoReport {
        tick,
        checked,
        violations,
    })
}

// ---------------------------------------------------------------------------
// Determinism and parity
// ---------------------------------------------------------------------------

/// Two reset outcomes and the first observation difference between them.
#[derive(Debug, Clone, PartialEq)]
pub struct ParityReport {
    pub first: StepOutcome,
    pub second: StepOutcome,
    pub mismatch: Option<ObsMismatch>,
}

impl ParityReport {
    fn compare(first: StepOutcome, second: StepOutcome, verifier: &DeterminismVerifier) -> Self {
        let mismatch = verifier.check(&first.obs, &second.obs).err();
        Self {
            first,
            second,
            mismatch,
        }
    }

    pub const fn is_equal(&self) -> bool {
        self.mismatch.is_none()
    }
}

/// Reset twice with the same seed and kind on one transport.
pub fn reset_determinism(
    transport: &dyn Transport,
    seed: u64,
    kind: ObsKind,
    verifier: &DeterminismVerifier,
) -> Result<ParityReport, ClientError> {
    let first = transport.reset(seed, kind)?;
    let second = transport.reset(seed, kind)?;
    Ok(ParityReport::compare(first, second, verifier))
}

/// Reset once on each transport with the same seed and kind.
pub fn cross_transport_parity(
    a: &dyn Transport,
    b: &dyn Transport,
    seed: u64,
    kind: ObsKind,
    verifier: &DeterminismVerifier,
) -> Result<ParityReport, ClientError> {
    let first = a.reset(seed, kind)?;
    let second = b.reset(seed, kind)?;
    Ok(ParityReport::compare(first, second, verifier))
}

/// Draw a uniformly random action.
pub fn random_action<R: Rng + ?Sized>(rng: &mut R) -> Action {
    Action::ALL[rng.gen_range(0..Action::ALL.len())]
}

/// Broadcast random actions until at least one slot terminates.
///
/// Returns the tick that terminated the first slot(s), or `None` if
/// `max_ticks` broadcasts went by without a termination.
pub fn run_until_first_termination<R: Rng + ?Sized>(
    stepper: &PoolStepper<'_>,
    session: &mut Session,
    rng: &mut R,
    max_ticks: u64,
) -> Result<Option<TickReport>, ClientError> {
    for _ in 0..max_ticks {
        let report = stepper.broadcast(session, random_action(rng))?;
        if !report.newly_terminated.is_empty() {
            return Ok(Some(report));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use snakepool_core::types::ObsVariant;

    use super::*;

    fn terminal() -> StepOutcome {
        StepOutcome {
            obs: ObsVariant::Dense(vec![0.0; 19]),
            signals: Signals::new([0.0, -1.0, 0.0, 0.0, 0.0, 0.0]),
            done: true,
            score: 2,
            length: 5,
            death: DeathCause::Wall,
            steps: 40,
            render: None,
        }
    }

    fn echo() -> StepOutcome {
        StepOutcome {
            signals: Signals::ZERO,
            ..terminal()
        }
    }

    #[test]
    fn well_formed_echo_has_no_violations() {
        assert!(check_echo(&terminal(), &echo(), DEFAULT_ECHO_TOLERANCE).is_empty());
    }

    #[test]
    fn tiny_signal_noise_is_tolerated() {
        let mut e = echo();
        e.signals = Signals::new([1e-9, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(check_echo(&terminal(), &e, DEFAULT_ECHO_TOLERANCE).is_empty());
    }

    #[test]
    fn every_violation_is_reported() {
        let e = StepOutcome {
            done: false,
            signals: Signals::new([0.0, 0.0, -0.01, 0.0, 0.0, 0.0]),
            score: 3,
            length: 6,
            death: DeathCause::None,
            steps: 41,
            ..terminal()
        };
        let violations = check_echo(&terminal(), &e, DEFAULT_ECHO_TOLERANCE);
        assert_eq!(violations.len(), 6);
        assert_eq!(violations[0], EchoViolation::NotDone);
        assert!(matches!(violations[1], EchoViolation::NonZeroSignals { .. }));
        assert_eq!(
            violations[2],
            EchoViolation::ScoreChanged {
                before: 2,
                after: 3
            }
        );
        assert_eq!(
            violations[4].to_string(),
            "death cause changed from 'wall' to ''"
        );
    }

    #[test]
    fn random_action_covers_all_actions() {
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
        let mut seen = [false; 3];
        for _ in 0..200 {
            seen[usize::from(random_action(&mut rng).index())] = true;
        }
        assert_eq!(seen, [true; 3]);
    }
}
