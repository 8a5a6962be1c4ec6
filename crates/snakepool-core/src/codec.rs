//! Observation codec: canonicalization and comparison.
//!
//! Transport adapters convert their wire messages into the neutral payload
//! structs below ([`ObsPayload`], [`RawPayload`], [`OutcomePayload`]). The
//! codec turns those into [`ObsVariant`] / [`StepOutcome`] values, checking
//! the shape the requested [`ObsKind`] demands:
//!
//! 1. exactly one of the dense / raw slots is populated,
//! 2. the populated slot matches the kind's variant,
//! 3. dense length equals the kind's fixed arity,
//! 4. raw payloads carry every required field.
//!
//! Nothing is patched up: any violation is returned as an [`ObsError`]
//! naming the offending field.

use thiserror::Error;

use crate::error::ObsError;
use crate::types::{
    DeathCause, Direction, ObsKind, ObsVariant, Point, RawState, Signals, StepOutcome,
};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Observation slot of a wire message, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObsPayload {
    /// Kind the server says it encoded, when the wire format states it
    /// unambiguously.
    pub declared: Option<String>,
    pub dense: Option<Vec<f32>>,
    pub raw: Option<RawPayload>,
}

/// Raw grid state as it appears on the wire. Integers are widened so that
/// negative or oversized values can be reported instead of wrapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPayload {
    pub cols: i64,
    pub rows: i64,
    pub step: i64,
    pub head: Option<Point>,
    pub dir: String,
    pub food: Option<Point>,
    pub body: Vec<Point>,
}

/// A reset/step response as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomePayload {
    pub obs: Option<ObsPayload>,
    pub signals: Vec<f32>,
    pub done: bool,
    pub score: i64,
    pub length: i64,
    pub death: String,
    pub steps: i64,
    pub render: Option<RawPayload>,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Canonicalize an observation payload for `kind`.
pub fn decode_obs(kind: ObsKind, payload: ObsPayload) -> Result<ObsVariant, ObsError> {
    if let Some(declared) = payload.declared.as_deref() {
        let declared_kind: ObsKind = declared
            .parse()
            .map_err(|_| ObsError::malformed("obs.type", format!("unknown kind '{declared}'")))?;
        if declared_kind != kind {
            return Err(ObsError::malformed(
                "obs.type",
                format!("requested {kind}, server declared {declared_kind}"),
            ));
        }
    }

    match (payload.dense, payload.raw) {
        (Some(_), Some(_)) => Err(ObsError::malformed(
            "obs",
            "both dense and raw payloads are populated",
        )),
        (None, None) => Err(ObsError::malformed(
            "obs",
            "neither dense nor raw payload is populated",
        )),
        (Some(values), None) => {
            let Some(expected) = kind.dense_len() else {
                return Err(ObsError::malformed(
                    "obs",
                    format!("expected raw payload for {kind}, got dense"),
                ));
            };
            if values.len() != expected {
                return Err(ObsError::ObsLengthMismatch {
                    kind,
                    expected,
                    actual: values.len(),
                });
            }
            Ok(ObsVariant::Dense(values))
        }
        (None, Some(raw)) => {
            if !kind.is_raw() {
                return Err(ObsError::malformed(
                    "obs",
                    format!("expected dense payload for {kind}, got raw"),
                ));
            }
            decode_raw(raw).map(ObsVariant::Raw)
        }
    }
}

/// Validate a raw grid payload.
pub fn decode_raw(raw: RawPayload) -> Result<RawState, ObsError> {
    let cols = counter("raw.cols", raw.cols)?;
    let rows = counter("raw.rows", raw.rows)?;
    if cols == 0 {
        return Err(ObsError::malformed("raw.cols", "must be > 0"));
    }
    if rows == 0 {
        return Err(ObsError::malformed("raw.rows", "must be > 0"));
    }
    let step = counter("raw.step", raw.step)?;
    let head = raw
        .head
        .ok_or_else(|| ObsError::malformed("raw.head", "missing"))?;
    let food = raw
        .food
        .ok_or_else(|| ObsError::malformed("raw.food", "missing"))?;
    let dir: Direction = raw
        .dir
        .parse()
        .map_err(|_| ObsError::malformed("raw.dir", format!("unknown direction '{}'", raw.dir)))?;

    Ok(RawState {
        cols,
        rows,
        step,
        head,
        dir,
        food,
        body: raw.body,
    })
}

/// Canonicalize a full reset/step response for `kind`.
pub fn decode_outcome(kind: ObsKind, payload: OutcomePayload) -> Result<StepOutcome, ObsError> {
    let obs = payload
        .obs
        .ok_or_else(|| ObsError::malformed("obs", "missing observation"))?;
    let obs = decode_obs(kind, obs)?;
    let signals = Signals::try_from(payload.signals.as_slice())?;
    let death: DeathCause = payload.death.parse()?;

    let timeout_signalled = signals.timeout() != 0.0;
    if payload.done && !death.is_terminal() && !timeout_signalled {
        return Err(ObsError::malformed(
            "done",
            "done without a death cause or timeout signal",
        ));
    }
    if !payload.done && death.is_terminal() {
        return Err(ObsError::malformed(
            "done",
            format!("death cause '{death}' reported on a live env"),
        ));
    }
    if !payload.done && timeout_signalled {
        return Err(ObsError::malformed("done", "timeout signalled on a live env"));
    }

    let render = payload
        .render
        .map(decode_raw)
        .transpose()
        .map_err(|e| match e {
            ObsError::MalformedObservation { field, reason } => {
                ObsError::malformed("render", format!("{field}: {reason}"))
            }
            other => other,
        })?;

    Ok(StepOutcome {
        obs,
        signals,
        done: payload.done,
        score: counter("score", payload.score)?,
        length: counter("length", payload.length)?,
        death,
        steps: counter("steps", payload.steps)?,
        render,
    })
}

fn counter(field: &'static str, value: i64) -> Result<u32, ObsError> {
    u32::try_from(value)
        .map_err(|_| ObsError::malformed(field, format!("{value} is not a valid count")))
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Absolute tolerance for dense observation equality.
///
/// Only meant to absorb float round-trip noise between encodings; raw
/// observations are always compared exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    dense_abs: f64,
}

impl Tolerance {
    pub const DEFAULT: Self = Self { dense_abs: 1e-9 };
    pub const EXACT: Self = Self { dense_abs: 0.0 };

    pub const fn new(dense_abs: f64) -> Self {
        Self { dense_abs }
    }

    pub const fn dense_abs(self) -> f64 {
        self.dense_abs
    }

    /// Bit-identical values (including NaN) are always equal.
    pub fn dense_eq(self, a: f32, b: f32) -> bool {
        a.to_bits() == b.to_bits() || (f64::from(a) - f64::from(b)).abs() <= self.dense_abs
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// First difference found between two observations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObsMismatch {
    #[error("variant differs: {left} vs {right}")]
    Variant {
        left: &'static str,
        right: &'static str,
    },

    #[error("dense length differs: {left} vs {right}")]
    DenseLength { left: usize, right: usize },

    #[error("dense element {index} differs: {left} vs {right} (tolerance {tolerance})")]
    DenseElement {
        index: usize,
        left: f32,
        right: f32,
        tolerance: f64,
    },

    #[error("raw field {field} differs")]
    RawField { field: &'static str },
}

impl ObsVariant {
    /// Compare under the codec's equality rule, reporting the first
    /// difference.
    pub fn compare(&self, other: &Self, tol: Tolerance) -> Result<(), ObsMismatch> {
        match (self, other) {
            (Self::Dense(a), Self::Dense(b)) => compare_dense(a, b, tol),
            (Self::Raw(a), Self::Raw(b)) => compare_raw(a, b),
            _ => Err(ObsMismatch::Variant {
                left: self.variant_name(),
                right: other.variant_name(),
            }),
        }
    }

    pub fn canonical_eq(&self, other: &Self, tol: Tolerance) -> bool {
        self.compare(other, tol).is_ok()
    }
}

fn compare_dense(a: &[f32], b: &[f32], tol: Tolerance) -> Result<(), ObsMismatch> {
    if a.len() != b.len() {
        return Err(ObsMismatch::DenseLength {
            left: a.len(),
            right: b.len(),
        });
    }
    match a
        .iter()
        .zip(b)
        .position(|(x, y)| !tol.dense_eq(*x, *y))
    {
        Some(index) => Err(ObsMismatch::DenseElement {
            index,
            left: a[index],
            right: b[index],
            tolerance: tol.dense_abs(),
        }),
        None => Ok(()),
    }
}

fn compare_raw(a: &RawState, b: &RawState) -> Result<(), ObsMismatch> {
    let field = if a.cols != b.cols {
        "cols"
    } else if a.rows != b.rows {
        "rows"
    } else if a.step != b.step {
        "step"
    } else if a.head != b.head {
        "head"
    } else if a.dir != b.dir {
        "dir"
    } else if a.food != b.food {
        "food"
    } else if a.body != b.body {
        "body"
    } else {
        return Ok(());
    };
    Err(ObsMismatch::RawField { field })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
