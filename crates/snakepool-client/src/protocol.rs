//! JSON request/response types for the REST transport.
//!
//! Request bodies are plain snake_case JSON. Responses for reset/step calls
//! are protobuf-JSON, so every field accepts both its lowerCamelCase and
//! snake_case spelling, unset message fields may be absent or `null`, and
//! floats may arrive as the strings `"NaN"`, `"Infinity"`, `"-Infinity"`.
//!
//! The response DTOs convert into the codec payload structs of
//! [`snakepool_core::codec`]; no validation happens here.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use snakepool_core::codec::{ObsPayload, OutcomePayload, RawPayload};
use snakepool_core::error::ObsError;
use snakepool_core::types::{Action, EnvSpec, ObsKind, Point};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// `POST /reset`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetBody {
    pub seed: u64,
    pub obs_type: ObsKind,
    pub with_raw: bool,
}

/// `POST /step`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepBody {
    pub action: Action,
    pub with_raw: bool,
}

/// `POST /reset_many`. An empty `session` asks the server for a new id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetManyBody<'a> {
    pub seeds: &'a [u64],
    pub obs_type: ObsKind,
    pub count: usize,
    pub session: &'a str,
    pub with_raw: bool,
}

/// `POST /step_many`. One action broadcasts to every slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepManyBody<'a> {
    pub session: &'a str,
    pub actions: &'a [Action],
    pub with_raw: bool,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Enum value as protobuf-JSON may render it: by name or by number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireEnum {
    Name(String),
    Number(i32),
}

impl WireEnum {
    pub fn obs_kind(&self) -> Option<ObsKind> {
        match self {
            Self::Name(name) => name.parse().ok(),
            Self::Number(value) => ObsKind::from_proto_value(*value),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Number(value) => value.to_string(),
        }
    }
}

/// `GET /spec`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecDto {
    pub cols: i64,
    pub rows: i64,
    #[serde(alias = "timeoutMult")]
    pub timeout_mult: i64,
    #[serde(alias = "supportedObs")]
    pub supported_obs: Vec<WireEnum>,
    #[serde(alias = "rewardSignals")]
    pub reward_signals: Vec<String>,
}

impl SpecDto {
    pub fn into_spec(self) -> Result<EnvSpec, ObsError> {
        let supported = self
            .supported_obs
            .iter()
            .filter_map(|entry| {
                let kind = entry.obs_kind();
                if kind.is_none() {
                    warn!(entry = %entry.label(), "Skipping unknown obs kind in spec");
                }
                kind
            })
            .collect();
        build_spec(
            self.cols,
            self.rows,
            self.timeout_mult,
            supported,
            self.reward_signals,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PointDto {
    pub x: i32,
    pub y: i32,
}

impl From<PointDto> for Point {
    fn from(p: PointDto) -> Self {
        Self::new(p.x, p.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawStateDto {
    pub cols: i64,
    pub rows: i64,
    pub step: i64,
    pub head: Option<PointDto>,
    pub dir: String,
    pub food: Option<PointDto>,
    #[serde(deserialize_with = "null_as_empty")]
    pub body: Vec<PointDto>,
}

impl From<RawStateDto> for RawPayload {
    fn from(raw: RawStateDto) -> Self {
        Self {
            cols: raw.cols,
            rows: raw.rows,
            step: raw.step,
            head: raw.head.map(Point::from),
            dir: raw.dir,
            food: raw.food.map(Point::from),
            body: raw.body.into_iter().map(Point::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DenseDto {
    #[serde(deserialize_with = "wire_floats")]
    pub data: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ObservationDto {
    #[serde(rename = "type")]
    pub kind: Option<WireEnum>,
    pub dense: Option<DenseDto>,
    pub raw: Option<RawStateDto>,
}

impl From<ObservationDto> for ObsPayload {
    fn from(obs: ObservationDto) -> Self {
        Self {
            // Numbers are resolved here so an unknown one still reaches the
            // codec as an unparseable name.
            declared: obs.kind.map(|k| match k.obs_kind() {
                Some(kind) => kind.name().to_string(),
                None => k.label(),
            }),
            dense: obs.dense.map(|d| d.data),
            raw: obs.raw.map(RawPayload::from),
        }
    }
}

/// Reset/step response, also the element type of [`ManyResponseDto::envs`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StepResponseDto {
    pub obs: Option<ObservationDto>,
    #[serde(deserialize_with = "wire_floats")]
    pub signals: Vec<f32>,
    pub done: bool,
    pub score: i64,
    pub length: i64,
    pub death: String,
    pub steps: i64,
    #[serde(alias = "rawForRender")]
    pub raw_for_render: Option<RawStateDto>,
}

impl From<StepResponseDto> for OutcomePayload {
    fn from(r: StepResponseDto) -> Self {
        Self {
            obs: r.obs.map(ObsPayload::from),
            signals: r.signals,
            done: r.done,
            score: r.score,
            length: r.length,
            death: r.death,
            steps: r.steps,
            render: r.raw_for_render.map(RawPayload::from),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ManyResponseDto {
    #[serde(deserialize_with = "null_as_empty")]
    pub envs: Vec<StepResponseDto>,
    pub session: String,
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Assemble an [`EnvSpec`] from wire integers, rejecting negative values.
pub(crate) fn build_spec(
    cols: i64,
    rows: i64,
    timeout_mult: i64,
    supported_obs: Vec<ObsKind>,
    reward_signals: Vec<String>,
) -> Result<EnvSpec, ObsError> {
    let count = |field: &'static str, value: i64| {
        u32::try_from(value)
            .map_err(|_| ObsError::malformed(field, format!("{value} is not a valid count")))
    };
    Ok(EnvSpec {
        cols: count("spec.cols", cols)?,
        rows: count("spec.rows", rows)?,
        timeout_mult: count("spec.timeout_mult", timeout_mult)?,
        supported_obs,
        reward_signals,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireFloat {
    Number(f32),
    Text(String),
}

fn wire_floats<'de, D>(deserializer: D) -> Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<WireFloat>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|v| match v {
            WireFloat::Number(n) => Ok(n),
            WireFloat::Text(s) => match s.as_str() {
                "NaN" => Ok(f32::NAN),
                "Infinity" => Ok(f32::INFINITY),
                "-Infinity" => Ok(f32::NEG_INFINITY),
                other => other.parse::<f32>().map_err(serde::de::Error::custom),
            },
        })
        .collect()
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
