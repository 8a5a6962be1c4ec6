//! The transport-agnostic contract every adapter implements.
//!
//! Methods take `&self` so one adapter can serve several callers at once,
//! each driving its own pooled session.

use std::sync::Arc;

use snakepool_core::codec::{self, OutcomePayload};
use snakepool_core::error::{ClientError, ObsError};
use snakepool_core::types::{Action, EnvSpec, ObsKind, StepOutcome};

/// Reply to a `reset_many` / `step_many` call, one outcome per slot in slot
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolReply {
    pub session: String,
    pub envs: Vec<StepOutcome>,
}

/// One remote environment server reached over a specific wire protocol.
///
/// Every network-level failure is returned as
/// [`ClientError::Transport`]; payloads that do not fit the requested obs
/// kind are returned as [`ClientError::Observation`]. Nothing retries.
pub trait Transport: Send + Sync {
    /// Short adapter label for logs (`"rest"`, `"grpc"`, ...).
    fn name(&self) -> &'static str;

    /// Static environment description. Side-effect free.
    fn get_spec(&self) -> Result<EnvSpec, ClientError>;

    /// Start a new single-env episode.
    fn reset(&self, seed: u64, kind: ObsKind) -> Result<StepOutcome, ClientError>;

    /// Advance the single env. `kind` is the kind of the most recent reset
    /// and fixes how the reply is validated.
    fn step(&self, kind: ObsKind, action: Action) -> Result<StepOutcome, ClientError>;

    /// Create a pool (when `session` is `None`) or reset an existing one in
    /// place, one env per seed.
    fn reset_many(
        &self,
        seeds: &[u64],
        kind: ObsKind,
        session: Option<&str>,
    ) -> Result<PoolReply, ClientError>;

    /// Step every slot of a pool. One action broadcasts.
    fn step_many(
        &self,
        session: &str,
        kind: ObsKind,
        actions: &[Action],
    ) -> Result<PoolReply, ClientError>;
}

macro_rules! forward_transport {
    ($ty:ty) => {
        impl<T: Transport + ?Sized> Transport for $ty {
            fn name(&self) -> &'static str {
                (**self).name()
            }

            fn get_spec(&self) -> Result<EnvSpec, ClientError> {
                (**self).get_spec()
            }

            fn reset(&self, seed: u64, kind: ObsKind) -> Result<StepOutcome, ClientError> {
                (**self).reset(seed, kind)
            }

            fn step(&self, kind: ObsKind, action: Action) -> Result<StepOutcome, ClientError> {
                (**self).step(kind, action)
            }

            fn reset_many(
                &self,
                seeds: &[u64],
                kind: ObsKind,
                session: Option<&str>,
            ) -> Result<PoolReply, ClientError> {
                (**self).reset_many(seeds, kind, session)
            }

            fn step_many(
                &self,
                session: &str,
                kind: ObsKind,
                actions: &[Action],
            ) -> Result<PoolReply, ClientError> {
                (**self).step_many(session, kind, actions)
            }
        }
    };
}

forward_transport!(&T);
forward_transport!(Box<T>);
forward_transport!(Arc<T>);

/// Canonicalize every env of a pool reply.
pub(crate) fn decode_pool<I>(kind: ObsKind, session: String, envs: I) -> Result<PoolReply, ClientError>
where
    I: IntoIterator<Item = OutcomePayload>,
{
    let envs = envs
        .into_iter()
        .map(|payload| codec::decode_outcome(kind, payload))
        .collect::<Result<Vec<_>, ObsError>>()?;
    Ok(PoolReply { session, envs })
}
