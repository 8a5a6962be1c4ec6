//! Transport A: JSON over HTTP/1.1 with a blocking `reqwest` client.

use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use snakepool_core::codec::{self, OutcomePayload};
use snakepool_core::config::ClientConfig;
use snakepool_core::error::{ClientError, TransportError};
use snakepool_core::types::{Action, EnvSpec, ObsKind, StepOutcome};

use crate::protocol::{
    ManyResponseDto, ResetBody, ResetManyBody, SpecDto, StepBody, StepManyBody, StepResponseDto,
};
use crate::transport::{PoolReply, Transport, decode_pool};

/// Error bodies longer than this are cut before being stored in
/// [`TransportError::Status`].
pub const MAX_ERROR_BODY: usize = 512;

/// REST adapter.
///
/// # Example
///
/// ```no_run
/// use snakepool_client::rest::RestTransport;
/// use snakepool_client::transport::Transport;
/// use snakepool_core::config::ClientConfig;
/// use snakepool_core::types::ObsKind;
///
/// let rest = RestTransport::new(&ClientConfig::default()).unwrap();
/// let outcome = rest.reset(123_456_789, ObsKind::Dense11).unwrap();
/// assert_eq!(outcome.obs.as_dense().map(<[f32]>::len), Some(11));
/// ```
#[derive(Debug, Clone)]
pub struct RestTransport {
    client: Client,
    base: String,
    with_raw: bool,
}

impl RestTransport {
    /// Build a client from validated configuration. No request is sent.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Connect {
                operation: "connect",
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base: config.rest_url.trim_end_matches('/').to_string(),
            with_raw: config.with_raw,
        })
    }

    /// Base URL with any trailing `/` removed.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    fn get<R: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> Result<R, TransportError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .map_err(|e| map_reqwest(operation, &e))?;
        read_json(operation, response)
    }

    fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<R, TransportError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .map_err(|e| map_reqwest(operation, &e))?;
        read_json(operation, response)
    }
}

impl Transport for RestTransport {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn get_spec(&self) -> Result<EnvSpec, ClientError> {
        debug!(transport = "rest", "get_spec");
        let dto: SpecDto = self.get("get_spec", "spec")?;
        Ok(dto.into_spec()?)
    }

    fn reset(&self, seed: u64, kind: ObsKind) -> Result<StepOutcome, ClientError> {
        debug!(transport = "rest", seed, %kind, "reset");
        let body = ResetBody {
            seed,
            obs_type: kind,
            with_raw: self.with_raw,
        };
        let dto: StepResponseDto = self.post("reset", "reset", &body)?;
        Ok(codec::decode_outcome(kind, OutcomePayload::from(dto))?)
    }

    fn step(&self, kind: ObsKind, action: Action) -> Result<StepOutcome, ClientError> {
        debug!(transport = "rest", %kind, %action, "step");
        let body = StepBody {
            action,
            with_raw: self.with_raw,
        };
        let dto: StepResponseDto = self.post("step", "step", &body)?;
        Ok(codec::decode_outcome(kind, OutcomePayload::from(dto))?)
    }

    fn reset_many(
        &self,
        seeds: &[u64],
        kind: ObsKind,
        session: Option<&str>,
    ) -> Result<PoolReply, ClientError> {
        debug!(transport = "rest", slots = seeds.len(), %kind, session, "reset_many");
        let body = ResetManyBody {
            seeds,
            obs_type: kind,
            count: seeds.len(),
            session: session.unwrap_or_default(),
            with_raw: self.with_raw,
        };
        let dto: ManyResponseDto = self.post("reset_many", "reset_many", &body)?;
        decode_pool(kind, dto.session, dto.envs.into_iter().map(OutcomePayload::from))
    }

    fn step_many(
        &self,
        session: &str,
        kind: ObsKind,
        actions: &[Action],
    ) -> Result<PoolReply, ClientError> {
        debug!(transport = "rest", session, actions = actions.len(), "step_many");
        let body = StepManyBody {
            session,
            actions,
            with_raw: self.with_raw,
        };
        let dto: ManyResponseDto = self.post("step_many", "step_many", &body)?;
        decode_pool(kind, dto.session, dto.envs.into_iter().map(OutcomePayload::from))
    }
}

fn read_json<R: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<R, TransportError> {
    let status = response.status();
    let body = response.text().map_err(|e| map_reqwest(operation, &e))?;
    if !status.is_success() {
        return Err(TransportError::Status {
            operation,
            code: status.as_u16(),
            body: truncate_body(body),
        });
    }
    serde_json::from_str(&body).map_err(|e| TransportError::Decode {
        operation,
        message: e.to_string(),
    })
}

fn map_reqwest(operation: &'static str, err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { operation }
    } else if err.is_decode() {
        TransportError::Decode {
            operation,
            message: err.to_string(),
        }
    } else {
        TransportError::Connect {
            operation,
            message: err.to_string(),
        }
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
