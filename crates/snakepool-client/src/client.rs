//! [`EnvClient`]: the transport-agnostic facade most callers use.

use std::sync::{Mutex, OnceLock, PoisonError};

use tracing::debug;

use snakepool_core::config::ClientConfig;
use snakepool_core::determinism::DeterminismVerifier;
use snakepool_core::error::{ArgumentError, ClientError};
use snakepool_core::types::{Action, EnvSpec, ObsKind, ObsVariant, StepOutcome};

use crate::conformance::DEFAULT_ECHO_TOLERANCE;
use crate::pool::{PoolStepper, TickReport};
use crate::session::Session;
use crate::transport::Transport;

/// Single-env and pooled access to one server through one transport.
///
/// The spec is fetched once and cached; every reset is preceded by a check
/// that the server supports the requested obs kind. The client is `Sync`
/// whenever the transport is, so it can be shared between threads that each
/// drive their own [`Session`].
///
/// # Example
///
/// ```no_run
/// use snakepool_client::client::EnvClient;
/// use snakepool_client::rest::RestTransport;
/// use snakepool_core::config::ClientConfig;
/// use snakepool_core::types::{Action, ObsKind};
///
/// let config = ClientConfig::default();
/// let client = EnvClient::with_config(RestTransport::new(&config).unwrap(), &config);
/// let obs = client.reset(123_456_789, ObsKind::Dense11).unwrap();
/// assert_eq!(obs.as_dense().map(<[f32]>::len), Some(11));
/// let outcome = client.step(Action::Straight).unwrap();
/// assert_eq!(outcome.signals.as_slice().len(), 6);
/// ```
#[derive(Debug)]
pub struct EnvClient<T> {
    transport: T,
    verifier: DeterminismVerifier,
    echo_tolerance: f64,
    spec: OnceLock<EnvSpec>,
    active_kind: Mutex<Option<ObsKind>>,
}

impl<T: Transport> EnvClient<T> {
    /// Default tolerances.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            verifier: DeterminismVerifier::default(),
            echo_tolerance: DEFAULT_ECHO_TOLERANCE,
            spec: OnceLock::new(),
            active_kind: Mutex::new(None),
        }
    }

    /// Tolerances taken from `config`.
    pub fn with_config(transport: T, config: &ClientConfig) -> Self {
        Self {
            verifier: DeterminismVerifier::new(config.tolerance()),
            echo_tolerance: config.echo_tolerance,
            ..Self::new(transport)
        }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub const fn verifier(&self) -> &DeterminismVerifier {
        &self.verifier
    }

    /// Server spec, fetched on first use.
    pub fn spec(&self) -> Result<&EnvSpec, ClientError> {
        if let Some(spec) = self.spec.get() {
            return Ok(spec);
        }
        let spec = self.transport.get_spec()?;
        debug!(
            transport = self.transport.name(),
            cols = spec.cols,
            rows = spec.rows,
            supported = spec.supported_obs.len(),
            "Spec cached"
        );
        Ok(self.spec.get_or_init(|| spec))
    }

    /// Pre-flight check run before any reset.
    fn ensure_supported(&self, kind: ObsKind) -> Result<(), ClientError> {
        self.spec()?.ensure_supports(kind)
    }

    /// Obs kind of the most recent single-env reset.
    pub fn active_kind(&self) -> Option<ObsKind> {
        *self
            .active_kind
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a single-env episode and return its initial observation.
    pub fn reset(&self, seed: u64, kind: ObsKind) -> Result<ObsVariant, ClientError> {
        self.reset_outcome(seed, kind).map(|outcome| outcome.obs)
    }

    /// Like [`reset`](Self::reset) but returns the full initial outcome.
    pub fn reset_outcome(&self, seed: u64, kind: ObsKind) -> Result<StepOutcome, ClientError> {
        self.ensure_supported(kind)?;
        let outcome = self.transport.reset(seed, kind)?;
        *self
            .active_kind
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(kind);
        Ok(outcome)
    }

    /// Step the single env reset last.
    pub fn step(&self, action: Action) -> Result<StepOutcome, ClientError> {
        let kind = self.active_kind().ok_or(ArgumentError::NoActiveEpisode)?;
        self.transport.step(kind, action)
    }

    /// [`step`](Self::step) with a raw action index; anything outside
    /// `{0, 1, 2}` is rejected before any I/O.
    pub fn step_index(&self, action: i64) -> Result<StepOutcome, ClientError> {
        self.step(Action::try_from(action)?)
    }

    pub fn stepper(&self) -> PoolStepper<'_> {
        PoolStepper::new(&self.transport).with_echo_tolerance(self.echo_tolerance)
    }

    /// Create a pooled session with one slot per seed.
    pub fn reset_many(&self, seeds: &[u64], kind: ObsKind) -> Result<Session, ClientError> {
        if seeds.is_empty() {
            return Err(ArgumentError::EmptySeeds.into());
        }
        self.ensure_supported(kind)?;
        self.stepper().reset_many(seeds, kind)
    }

    /// Reset an existing session in place with new seeds.
    pub fn reset_many_in_place(
        &self,
        session: &mut Session,
        seeds: &[u64],
    ) -> Result<(), ClientError> {
        self.stepper().reset_in_place(session, seeds)
    }

    pub fn step_many(
        &self,
        session: &mut Session,
        actions: &[Action],
    ) -> Result<TickReport, ClientError> {
        self.stepper().step_many(session, actions)
    }

    /// [`step_many`](Self::step_many) with raw action indices.
    pub fn step_many_indices(
        &self,
        session: &mut Session,
        actions: &[i64],
    ) -> Result<TickReport, ClientError> {
        let actions = Action::from_indices(actions)?;
        self.step_many(session, &actions)
    }

    pub fn broadcast(&self, session: &mut Session, action: Action) -> Result<TickReport, ClientError> {
        self.stepper().broadcast(session, action)
    }

    /// Reset twice with the same seed and compare the observations.
    pub fn verify_reset_determinism(&self, seed: u64, kind: ObsKind) -> Result<bool, ClientError> {
        let first = self.reset(seed, kind)?;
        let second = self.reset(seed, kind)?;
        Ok(self.verifier.verify(&first, &second))
    }
}
