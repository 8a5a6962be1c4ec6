//! Blocking client for a remote, seed-deterministic snake environment
//! server reachable over two parity transports.
//!
//! - [`transport`]: the [`Transport`] trait every adapter implements
//! - [`rest`]: [`RestTransport`], JSON over HTTP/1.1
//! - [`grpc`]: [`GrpcTransport`], HTTP/2 RPC
//! - [`protocol`] / [`proto`]: wire types of the two transports
//! - [`session`] / [`pool`]: pooled sessions and the [`PoolStepper`]
//! - [`client`]: the [`EnvClient`] facade
//! - [`conformance`]: determinism, parity and echo checks
//!
//! Observations from both transports are canonicalized by
//! [`snakepool_core::codec`], so results can be compared across transports.

pub mod client;
pub mod conformance;
pub mod grpc;
pub mod pool;
pub mod proto;
pub mod protocol;
pub mod rest;
pub mod session;
pub mod transport;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use client::EnvClient;
pub use conformance::{EchoReport, EchoViolation, ParityReport, check_echo};
pub use grpc::GrpcTransport;
pub use pool::{PoolStepper, TickReport};
pub use rest::RestTransport;
pub use session::{Session, SlotState, SlotStatus};
pub use transport::{PoolReply, Transport};

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        EnvClient, GrpcTransport, PoolReply, PoolStepper, RestTransport, Session, SlotStatus,
        TickReport, Transport,
    };
    pub use snakepool_core::prelude::*;
}
