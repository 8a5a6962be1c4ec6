//! Pool stepper: maps action vectors onto the slots of a [`Session`].
//!
//! All argument checks happen before any I/O, and a failed call leaves the
//! session exactly as it was. Server outcomes are stored verbatim; for
//! slots that were already terminated the stepper only checks the echo
//! contract and logs what it finds.

use tracing::{debug, info, warn};

use snakepool_core::error::{ArgumentError, ClientError, ObsError};
use snakepool_core::types::{Action, ObsKind};

use crate::conformance::{DEFAULT_ECHO_TOLERANCE, check_echo};
use crate::session::Session;
use crate::transport::{PoolReply, Transport};

/// Summary of one `step_many` tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number within the session, starting at 1.
    pub tick: u64,
    /// Slots that terminated on this tick.
    pub newly_terminated: Vec<usize>,
    /// Slots still live after this tick.
    pub live: usize,
}

/// Drives pooled sessions over a transport.
///
/// # Example
///
/// ```no_run
/// use snakepool_client::pool::PoolStepper;
/// use snakepool_client::rest::RestTransport;
/// use snakepool_core::config::ClientConfig;
/// use snakepool_core::types::{Action, ObsKind};
///
/// let rest = RestTransport::new(&ClientConfig::default()).unwrap();
/// let stepper = PoolStepper::new(&rest);
/// let mut session = stepper.reset_many(&[1, 2, 3, 4], ObsKind::Raycasts19).unwrap();
/// let report = stepper.broadcast(&mut session, Action::Straight).unwrap();
/// assert_eq!(report.tick, 1);
/// ```
#[derive(Clone, Copy)]
pub struct PoolStepper<'a> {
    transport: &'a dyn Transport,
    echo_tolerance: f64,
}

impl std::fmt::Debug for PoolStepper<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolStepper")
            .field("transport", &self.transport.name())
            .field("echo_tolerance", &self.echo_tolerance)
            .finish()
    }
}

impl<'a> PoolStepper<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self {
            transport,
            echo_tolerance: DEFAULT_ECHO_TOLERANCE,
        }
    }

    #[must_use]
    pub const fn with_echo_tolerance(mut self, tol: f64) -> Self {
        self.echo_tolerance = tol;
        self
    }

    /// Create a new session with one slot per seed.
    pub fn reset_many(&self, seeds: &[u64], kind: ObsKind) -> Result<Session, ClientError> {
        if seeds.is_empty() {
            return Err(ArgumentError::EmptySeeds.into());
        }
        let reply = self.transport.reset_many(seeds, kind, None)?;
        check_reply(&reply, seeds.len())?;
        if reply.session.is_empty() {
            return Err(ObsError::malformed("session", "server returned an empty session id").into());
        }
        info!(
            transport = self.transport.name(),
            session = %reply.session,
            slots = seeds.len(),
            %kind,
            "Session created"
        );
        Ok(Session::new(reply.session, kind, seeds.to_vec(), reply.envs))
    }

    /// Reset every slot of an existing session with new seeds, keeping its
    /// id and obs kind.
    pub fn reset_in_place(&self, session: &mut Session, seeds: &[u64]) -> Result<(), ClientError> {
        if seeds.len() != session.len() {
            return Err(ArgumentError::SeedCountMismatch {
                expected: session.len(),
                got: seeds.len(),
            }
            .into());
        }
        let reply = self
            .transport
            .reset_many(seeds, session.obs_kind(), Some(session.id()))?;
        check_reply(&reply, seeds.len())?;
        if reply.session != session.id() {
            return Err(ObsError::malformed(
                "session",
                format!("expected '{}', server returned '{}'", session.id(), reply.session),
            )
            .into());
        }
        debug!(session = session.id(), slots = seeds.len(), "Session reset in place");
        session.reset_slots(seeds.to_vec(), reply.envs);
        Ok(())
    }

    /// Step every slot. `actions` must hold one action (broadcast) or one per
    /// slot, terminated slots included.
    pub fn step_many(
        &self,
        session: &mut Session,
        actions: &[Action],
    ) -> Result<TickReport, ClientError> {
        if actions.len() != 1 && actions.len() != session.len() {
            return Err(ArgumentError::ActionCountMismatch {
                slots: session.len(),
                got: actions.len(),
            }
            .into());
        }
        let reply = self
            .transport
            .step_many(session.id(), session.obs_kind(), actions)?;
        check_reply(&reply, session.len())?;

        for (index, (slot, echo)) in session.slots().iter().zip(&reply.envs).enumerate() {
            let Some(terminal) = slot.terminal_outcome() else {
                continue;
            };
            for violation in check_echo(terminal, echo, self.echo_tolerance) {
                warn!(
                    session = session.id(),
                    slot = index,
                    %violation,
                    "Echo contract violated"
                );
            }
        }

        let newly_terminated = session.apply_tick(reply.envs);
        let report = TickReport {
            tick: session.ticks(),
            newly_terminated,
            live: session.live_count(),
        };
        debug!(
            session = session.id(),
            tick = report.tick,
            live = report.live,
            newly_terminated = report.newly_terminated.len(),
            "step_many"
        );
        Ok(report)
    }

    /// Apply one action to every slot.
    pub fn broadcast(&self, session: &mut Session, action: Action) -> Result<TickReport, ClientError> {
        self.step_many(session, &[action])
    }
}

fn check_reply(reply: &PoolReply, expected: usize) -> Result<(), ObsError> {
    if reply.envs.len() == expected {
        Ok(())
    } else {
        Err(ObsError::malformed(
            "envs",
            format!("expected {expected} envs, got {}", reply.envs.len()),
        ))
    }
}
