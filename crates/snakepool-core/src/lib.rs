// snakepool-core: Types, errors, config, observation codec and determinism checks.

pub mod codec;
pub mod config;
pub mod determinism;
pub mod error;
pub mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{ObsMismatch, Tolerance};
pub use config::ClientConfig;
pub use determinism::DeterminismVerifier;
pub use error::{ArgumentError, ClientError, ConfigError, ObsError, TransportError};
pub use types::{
    Action, DeathCause, Direction, EnvSpec, ObsKind, ObsVariant, Point, RawState, SIGNAL_COUNT,
    SIGNAL_NAMES, Signals, StepOutcome,
};

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Action, ClientConfig, ClientError, DeathCause, DeterminismVerifier, EnvSpec, ObsKind,
        ObsVariant, RawState, Signals, StepOutcome, Tolerance,
    };
}
