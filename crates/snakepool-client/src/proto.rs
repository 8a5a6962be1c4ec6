//! Protobuf messages and unary client for the `snake.v1.SnakeEnv` service.
//!
//! Declared by hand with the prost derives; the matching schema lives in
//! `proto/snake/v1/env.proto`. Enum-typed fields are carried as their `i32`
//! wire value and resolved through [`ObsKind::from_proto_value`].

use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

use snakepool_core::codec::{ObsPayload, OutcomePayload, RawPayload};
use snakepool_core::types::ObsKind;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Spec {
    #[prost(int32, tag = "1")]
    pub cols: i32,
    #[prost(int32, tag = "2")]
    pub rows: i32,
    #[prost(int32, tag = "3")]
    pub timeout_mult: i32,
    /// `ObsType` values.
    #[prost(int32, repeated, tag = "4")]
    pub supported_obs: Vec<i32>,
    #[prost(string, repeated, tag = "5")]
    pub reward_signals: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ResetRequest {
    #[prost(uint64, tag = "1")]
    pub seed: u64,
    #[prost(int32, tag = "2")]
    pub obs_type: i32,
    #[prost(bool, tag = "3")]
    pub with_raw: bool,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct StepRequest {
    #[prost(int32, tag = "1")]
    pub action: i32,
    #[prost(bool, tag = "2")]
    pub with_raw: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, prost::Message)]
pub struct Point {
    #[prost(int32, tag = "1")]
    pub x: i32,
    #[prost(int32, tag = "2")]
    pub y: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Dense {
    #[prost(float, repeated, tag = "1")]
    pub data: Vec<f32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RawState {
    #[prost(int32, tag = "1")]
    pub cols: i32,
    #[prost(int32, tag = "2")]
    pub rows: i32,
    #[prost(int32, tag = "3")]
    pub step: i32,
    #[prost(message, optional, tag = "4")]
    pub head: Option<Point>,
    #[prost(string, tag = "5")]
    pub dir: String,
    #[prost(message, optional, tag = "6")]
    pub food: Option<Point>,
    #[prost(message, repeated, tag = "7")]
    pub body: Vec<Point>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Observation {
    /// `ObsType` value.
    #[prost(int32, tag = "1")]
    pub r#type: i32,
    #[prost(oneof = "observation::Payload", tags = "2, 3")]
    pub payload: Option<observation::Payload>,
}

pub mod observation {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        Dense(super::Dense),
        #[prost(message, tag = "3")]
        Raw(super::RawState),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StepResponse {
    #[prost(message, optional, tag = "1")]
    pub obs: Option<Observation>,
    #[prost(float, repeated, tag = "2")]
    pub signals: Vec<f32>,
    #[prost(bool, tag = "3")]
    pub done: bool,
    #[prost(int32, tag = "4")]
    pub score: i32,
    #[prost(int32, tag = "5")]
    pub length: i32,
    #[prost(string, tag = "6")]
    pub death: String,
    #[prost(int32, tag = "7")]
    pub steps: i32,
    #[prost(message, optional, tag = "8")]
    pub raw_for_render: Option<RawState>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResetManyRequest {
    #[prost(uint64, repeated, tag = "1")]
    pub seeds: Vec<u64>,
    #[prost(int32, tag = "2")]
    pub obs_type: i32,
    #[prost(int32, tag = "3")]
    pub count: i32,
    #[prost(string, tag = "4")]
    pub session: String,
    #[prost(bool, tag = "5")]
    pub with_raw: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StepManyRequest {
    #[prost(string, tag = "1")]
    pub session: String,
    #[prost(int32, repeated, tag = "2")]
    pub actions: Vec<i32>,
    #[prost(bool, tag = "3")]
    pub with_raw: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ManyResponse {
    #[prost(message, repeated, tag = "1")]
    pub envs: Vec<StepResponse>,
    #[prost(string, tag = "2")]
    pub session: String,
}

// ---------------------------------------------------------------------------
// Conversions into codec payloads
// ---------------------------------------------------------------------------

impl From<Point> for snakepool_core::types::Point {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<RawState> for RawPayload {
    fn from(raw: RawState) -> Self {
        Self {
            cols: raw.cols.into(),
            rows: raw.rows.into(),
            step: raw.step.into(),
            head: raw.head.map(Into::into),
            dir: raw.dir,
            food: raw.food.map(Into::into),
            body: raw.body.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Observation> for ObsPayload {
    /// The `type` field is not forwarded: in proto3 an unset enum reads as
    /// value 0, so a missing type cannot be told apart from `RAW_STATE`.
    fn from(obs: Observation) -> Self {
        let (dense, raw) = match obs.payload {
            Some(observation::Payload::Dense(d)) => (Some(d.data), None),
            Some(observation::Payload::Raw(r)) => (None, Some(RawPayload::from(r))),
            None => (None, None),
        };
        Self {
            declared: None,
            dense,
            raw,
        }
    }
}

impl From<StepResponse> for OutcomePayload {
    fn from(r: StepResponse) -> Self {
        Self {
            obs: r.obs.map(ObsPayload::from),
            signals: r.signals,
            done: r.done,
            score: r.score.into(),
            length: r.length.into(),
            death: r.death,
            steps: r.steps.into(),
            render: r.raw_for_render.map(RawPayload::from),
        }
    }
}

impl ResetRequest {
    pub fn new(seed: u64, kind: ObsKind, with_raw: bool) -> Self {
        Self {
            seed,
            obs_type: kind.proto_value(),
            with_raw,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

const SERVICE: &str = "snake.v1.SnakeEnv";

/// Unary client for `snake.v1.SnakeEnv`. Cheap to clone; clones share the
/// underlying channel.
#[derive(Debug, Clone)]
pub struct SnakeEnvClient {
    inner: tonic::client::Grpc<Channel>,
}

impl SnakeEnvClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    async fn unary<Req, Resp>(
        &mut self,
        request: Req,
        path: &'static str,
        method: &'static str,
    ) -> Result<Resp, tonic::Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unavailable(format!("Service was not ready: {e}")))?;
        let codec = tonic::codec::ProstCodec::default();
        let mut req = tonic::Request::new(request);
        req.extensions_mut()
            .insert(tonic::GrpcMethod::new(SERVICE, method));
        self.inner
            .unary(req, PathAndQuery::from_static(path), codec)
            .await
            .map(tonic::Response::into_inner)
    }

    pub async fn get_spec(&mut self) -> Result<Spec, tonic::Status> {
        self.unary(Empty {}, "/snake.v1.SnakeEnv/GetSpec", "GetSpec")
            .await
    }

    pub async fn reset(&mut self, request: ResetRequest) -> Result<StepResponse, tonic::Status> {
        self.unary(request, "/snake.v1.SnakeEnv/Reset", "Reset").await
    }

    pub async fn step(&mut self, request: StepRequest) -> Result<StepResponse, tonic::Status> {
        self.unary(request, "/snake.v1.SnakeEnv/Step", "Step").await
    }

    pub async fn reset_many(
        &mut self,
        request: ResetManyRequest,
    ) -> Result<ManyResponse, tonic::Status> {
        self.unary(request, "/snake.v1.SnakeEnv/ResetMany", "ResetMany")
            .await
    }

    pub async fn step_many(
        &mut self,
        request: StepManyRequest,
    ) -> Result<ManyResponse, tonic::Status> {
        self.unary(request, "/snake.v1.SnakeEnv/StepMany", "StepMany")
            .await
    }
}
