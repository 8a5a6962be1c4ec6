use thiserror::Error;

use crate::types::ObsKind;

/// Top-level error type returned by every client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Observation(#[from] ObsError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),

    #[error("Unsupported obs kind {kind}: server supports {supported:?}")]
    UnsupportedObsKind {
        kind: ObsKind,
        supported: Vec<ObsKind>,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether this error came from the network layer rather than from
    /// validation of arguments or payloads.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether this error is a transport timeout.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

/// Network, timeout and status failures from a transport adapter.
///
/// Always surfaced to the caller unchanged; nothing in this workspace
/// retries on one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{operation}: request timed out")]
    Timeout { operation: &'static str },

    #[error("{operation}: connection failed: {message}")]
    Connect {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: HTTP status {code}: {body}")]
    Status {
        operation: &'static str,
        code: u16,
        body: String,
    },

    #[error("{operation}: RPC status {code}: {message}")]
    Rpc {
        operation: &'static str,
        code: String,
        message: String,
    },

    #[error("{operation}: undecodable response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl TransportError {
    /// Name of the adapter operation that failed (`"reset"`, `"step_many"`, ...).
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Timeout { operation }
            | Self::Connect { operation, .. }
            | Self::Status { operation, .. }
            | Self::Rpc { operation, .. }
            | Self::Decode { operation, .. } => operation,
        }
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A server payload that does not have the shape the requested obs kind
/// requires. Always fatal to the call that received it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObsError {
    #[error("Malformed observation: {field}: {reason}")]
    MalformedObservation { field: &'static str, reason: String },

    #[error("Observation length mismatch for {kind}: expected {expected}, got {actual}")]
    ObsLengthMismatch {
        kind: ObsKind,
        expected: usize,
        actual: usize,
    },
}

impl ObsError {
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedObservation {
            field,
            reason: reason.into(),
        }
    }
}

/// Caller-supplied values rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("Action out of range: {value} (valid: 0, 1, 2)")]
    ActionOutOfRange { value: i64 },

    #[error("Unknown action name '{0}' (valid: Straight, TurnRight, TurnLeft)")]
    UnknownAction(String),

    #[error("Unknown obs kind '{0}'")]
    UnknownObsKind(String),

    #[error("Unknown direction '{0}'")]
    UnknownDirection(String),

    #[error("Action count mismatch: expected 1 or {slots}, got {got}")]
    ActionCountMismatch { slots: usize, got: usize },

    #[error("At least one seed is required")]
    EmptySeeds,

    #[error("Seed count mismatch: session has {expected} slots, got {got} seeds")]
    SeedCountMismatch { expected: usize, got: usize },

    #[error("Too many seeds: {got} (max {max})")]
    TooManySeeds { got: usize, max: usize },

    #[error("No active episode: call reset before step")]
    NoActiveEpisode,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_from_transport_error() {
        let err: ClientError = TransportError::Timeout { operation: "step" }.into();
        assert!(err.is_transport());
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Transport error: step: request timed out");
    }

    #[test]
    fn client_error_from_obs_error_is_transparent() {
        let err: ClientError = ObsError::ObsLengthMismatch {
            kind: ObsKind::Dense11,
            expected: 11,
            actual: 10,
        }
        .into();
        assert!(!err.is_transport());
        assert_eq!(
            err.to_string(),
            "Observation length mismatch for Dense11: expected 11, got 10"
        );
    }

    #[test]
    fn client_error_from_argument_error() {
        let err: ClientError = ArgumentError::ActionCountMismatch { slots: 8, got: 3 }.into();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        assert!(err.to_string().contains("expected 1 or 8, got 3"));
    }

    #[test]
    fn unsupported_obs_kind_lists_supported() {
        let err = ClientError::UnsupportedObsKind {
            kind: ObsKind::Dense32,
            supported: vec![ObsKind::Dense11],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported obs kind Dense32: server supports [Dense11]"
        );
    }

    #[test]
    fn transport_error_operation() {
        let errors = [
            TransportError::Timeout { operation: "reset" },
            TransportError::Connect {
                operation: "reset",
                message: "refused".into(),
            },
            TransportError::Status {
                operation: "reset",
                code: 500,
                body: String::new(),
            },
            TransportError::Rpc {
                operation: "reset",
                code: "Internal".into(),
                message: String::new(),
            },
            TransportError::Decode {
                operation: "reset",
                message: String::new(),
            },
        ];
        for err in &errors {
            assert_eq!(err.operation(), "reset");
        }
        assert_eq!(errors.iter().filter(|e| e.is_timeout()).count(), 1);
    }

    #[test]
    fn obs_error_display_messages() {
        assert_eq!(
            ObsError::malformed("raw.head", "missing").to_string(),
            "Malformed observation: raw.head: missing"
        );
    }

    #[test]
    fn argument_error_display_messages() {
        assert_eq!(
            ArgumentError::ActionOutOfRange { value: 3 }.to_string(),
            "Action out of range: 3 (valid: 0, 1, 2)"
        );
        assert_eq!(
            ArgumentError::SeedCountMismatch {
                expected: 8,
                got: 4
            }
            .to_string(),
            "Seed count mismatch: session has 8 slots, got 4 seeds"
        );
        assert_eq!(
            ArgumentError::TooManySeeds { got: 5, max: 4 }.to_string(),
            "Too many seeds: 5 (max 4)"
        );
        assert_eq!(
            ArgumentError::NoActiveEpisode.to_string(),
            "No active episode: call reset before step"
        );
    }

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::Io(_)));
    }
}
