//! Canned server responses in the JSON shapes the REST transport receives.
//!
//! `GET /spec` is plain snake_case JSON; reset/step responses are
//! protobuf-JSON with lowerCamelCase names and enum values by name.

use serde_json::{Value, json};

use snakepool_core::types::{ObsKind, SIGNAL_NAMES};

/// Spec listing every obs kind on a 40x30 board.
pub fn spec_json() -> Value {
    json!({
        "cols": 40,
        "rows": 30,
        "timeout_mult": 150,
        "supported_obs": ObsKind::ALL.map(ObsKind::name),
        "reward_signals": SIGNAL_NAMES,
    })
}

/// Spec supporting only `kinds`.
pub fn spec_json_with(kinds: &[ObsKind]) -> Value {
    let mut spec = spec_json();
    spec["supported_obs"] = kinds.iter().map(|k| Value::from(k.name())).collect();
    spec
}

/// Live outcome with a dense observation of `len` values.
pub fn dense_outcome_json(kind: ObsKind, len: usize) -> Value {
    json!({
        "obs": {
            "type": kind.proto_name(),
            "dense": { "data": vec![0.25_f32; len] },
        },
        "signals": [0.0, 0.0, -0.01, 0.01, 0.0, 0.0],
        "done": false,
        "score": 0,
        "length": 3,
        "death": "",
        "steps": 1,
    })
}

/// Terminal outcome with a dense observation of `len` values.
pub fn dead_outcome_json(kind: ObsKind, len: usize, death: &str) -> Value {
    let mut outcome = dense_outcome_json(kind, len);
    outcome["done"] = json!(true);
    outcome["death"] = json!(death);
    outcome["signals"] = json!([0.0, -1.0, -0.01, 0.0, 0.0, 0.0]);
    outcome
}

/// Echo of [`dead_outcome_json`]: same counters, zero signals.
pub fn echo_outcome_json(kind: ObsKind, len: usize, death: &str) -> Value {
    let mut outcome = dead_outcome_json(kind, len, death);
    outcome["signals"] = json!([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    outcome
}

/// Live outcome with a raw grid observation.
pub fn raw_outcome_json() -> Value {
    json!({
        "obs": {
            "type": "RAW_STATE",
            "raw": {
                "cols": 40,
                "rows": 30,
                "step": 0,
                "head": { "x": 20, "y": 15 },
                "dir": "RIGHT",
                "food": { "x": 3, "y": 7 },
                "body": [{ "x": 19, "y": 15 }, { "x": 18, "y": 15 }],
            },
        },
        "signals": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        "done": false,
        "score": 0,
        "length": 3,
        "death": "",
        "steps": 0,
    })
}

/// Pool reply wrapping `envs`.
pub fn many_json(session: &str, envs: Vec<Value>) -> Value {
    json!({ "envs": envs, "session": session })
}
