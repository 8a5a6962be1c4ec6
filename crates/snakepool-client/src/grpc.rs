//! Transport B: HTTP/2 RPC through `tonic`, driven synchronously.
//!
//! The adapter owns a current-thread `tokio` runtime and blocks on it for
//! every call, so callers see the same blocking API as the REST adapter.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::runtime::Runtime;
use tonic::transport::Endpoint;
use tracing::{debug, warn};

use snakepool_core::codec::{self, OutcomePayload};
use snakepool_core::config::ClientConfig;
use snakepool_core::error::{ArgumentError, ClientError, TransportError};
use snakepool_core::types::{Action, EnvSpec, ObsKind, StepOutcome};

use crate::proto::{
    ResetManyRequest, ResetRequest, SnakeEnvClient, Spec, StepManyRequest, StepRequest,
};
use crate::protocol::build_spec;
use crate::transport::{PoolReply, Transport, decode_pool};

/// gRPC adapter.
pub struct GrpcTransport {
    runtime: Runtime,
    client: SnakeEnvClient,
    endpoint: String,
    request_timeout: Duration,
    with_raw: bool,
}

impl fmt::Debug for GrpcTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcTransport")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("with_raw", &self.with_raw)
            .finish_non_exhaustive()
    }
}

impl GrpcTransport {
    /// Validate `config` and establish the channel.
    ///
    /// Fails with [`TransportError::Connect`] when the endpoint is
    /// unreachable within the connect timeout.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let connect_err = |message: String| TransportError::Connect {
            operation: "connect",
            message,
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| connect_err(e.to_string()))?;

        // No channel-level timeout: `call` owns the request deadline.
        let endpoint = Endpoint::from_shared(config.grpc_endpoint.clone())
            .map_err(|e| connect_err(e.to_string()))?
            .connect_timeout(config.connect_timeout());
        let channel = runtime
            .block_on(endpoint.connect())
            .map_err(|e| connect_err(e.to_string()))?;

        debug!(endpoint = %config.grpc_endpoint, "gRPC channel established");
        Ok(Self {
            runtime,
            client: SnakeEnvClient::new(channel),
            endpoint: config.grpc_endpoint.clone(),
            request_timeout: config.request_timeout(),
            with_raw: config.with_raw,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one RPC to completion on the private runtime.
    fn call<F, Fut, R>(&self, operation: &'static str, f: F) -> Result<R, TransportError>
    where
        F: FnOnce(SnakeEnvClient) -> Fut,
        Fut: Future<Output = Result<R, tonic::Status>>,
    {
        let client = self.client.clone();
        let timeout = self.request_timeout;
        self.runtime.block_on(async move {
            match tokio::time::timeout(timeout, f(client)).await {
                Ok(result) => result.map_err(|status| map_status(operation, &status)),
                Err(_) => Err(TransportError::Timeout { operation }),
            }
        })
    }
}

impl Transport for GrpcTransport {
    fn name(&self) -> &'static str {
        "grpc"
    }

    fn get_spec(&self) -> Result<EnvSpec, ClientError> {
        debug!(transport = "grpc", "get_spec");
        let spec = self.call("get_spec", |mut c| async move { c.get_spec().await })?;
        Ok(spec_from_proto(spec)?)
    }

    fn reset(&self, seed: u64, kind: ObsKind) -> Result<StepOutcome, ClientError> {
        debug!(transport = "grpc", seed, %kind, "reset");
        let request = ResetRequest::new(seed, kind, self.with_raw);
        let response = self.call("reset", |mut c| async move { c.reset(request).await })?;
        Ok(codec::decode_outcome(kind, OutcomePayload::from(response))?)
    }

    fn step(&self, kind: ObsKind, action: Action) -> Result<StepOutcome, ClientError> {
        debug!(transport = "grpc", %kind, %action, "step");
        let request = StepRequest {
            action: action.into(),
            with_raw: self.with_raw,
        };
        let response = self.call("step", |mut c| async move { c.step(request).await })?;
        Ok(codec::decode_outcome(kind, OutcomePayload::from(response))?)
    }

    fn reset_many(
        &self,
        seeds: &[u64],
        kind: ObsKind,
        session: Option<&str>,
    ) -> Result<PoolReply, ClientError> {
        debug!(transport = "grpc", slots = seeds.len(), %kind, session, "reset_many");
        let request = ResetManyRequest {
            seeds: seeds.to_vec(),
            obs_type: kind.proto_value(),
            count: seed_count(seeds.len())?,
            session: session.unwrap_or_default().to_string(),
            with_raw: self.with_raw,
        };
        let response =
            self.call("reset_many", |mut c| async move { c.reset_many(request).await })?;
        decode_pool(
            kind,
            response.session,
            response.envs.into_iter().map(OutcomePayload::from),
        )
    }

    fn step_many(
        &self,
        session: &str,
        kind: ObsKind,
        actions: &[Action],
    ) -> Result<PoolReply, ClientError> {
        debug!(transport = "grpc", session, actions = actions.len(), "step_many");
        let request = StepManyRequest {
            session: session.to_string(),
            actions: actions.iter().map(|&a| i32::from(a)).collect(),
            with_raw: self.with_raw,
        };
        let response = self.call("step_many", |mut c| async move { c.step_many(request).await })?;
        decode_pool(
            kind,
            response.session,
            response.envs.into_iter().map(OutcomePayload::from),
        )
    }
}

/// The wire `count` field for a pool of `len` seeds.
fn seed_count(len: usize) -> Result<i32, ArgumentError> {
    i32::try_from(len).map_err(|_| ArgumentError::TooManySeeds {
        got: len,
        max: usize::try_from(i32::MAX).unwrap_or(usize::MAX),
    })
}

/// Map an RPC status onto the transport error taxonomy.
pub fn map_status(operation: &'static str, status: &tonic::Status) -> TransportError {
    match status.code() {
        tonic::Code::DeadlineExceeded => TransportError::Timeout { operation },
        tonic::Code::Unavailable => TransportError::Connect {
            operation,
            message: status.message().to_string(),
        },
        code => TransportError::Rpc {
            operation,
            code: format!("{code:?}"),
            message: status.message().to_string(),
        },
    }
}

fn spec_from_proto(spec: Spec) -> Result<EnvSpec, snakepool_core::error::ObsError> {
    let supported = spec
        .supported_obs
        .iter()
        .filter_map(|&value| {
            let kind = ObsKind::from_proto_value(value);
            if kind.is_none() {
                warn!(value, "Skipping unknown obs kind in spec");
            }
            kind
        })
        .collect();
    build_spec(
        spec.cols.into(),
        spec.rows.into(),
        spec.timeout_mult.into(),
        supported,
        spec.reward_signals,
    )
}
