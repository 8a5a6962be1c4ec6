//! Shared test fixtures and utilities for snakepool crates.
//!
//! Provides an in-memory [`MockServer`] transport, canned protobuf-JSON
//! replies for REST tests and deterministic RNG setup.

pub mod fixtures;
pub mod mock;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use mock::{Fault, MockConfig, MockServer};
pub use rng::{random_actions, seeded_rng, sequential_seeds};

/// Install a `tracing` fmt subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
