//! Deterministic RNG utilities for reproducible tests.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use snakepool_core::types::Action;

/// Create a deterministic `ChaCha8Rng` from a seed.
///
/// All test randomization should go through this to ensure reproducibility.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Draw `n` uniformly random actions.
pub fn random_actions<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<Action> {
    (0..n)
        .map(|_| Action::ALL[rng.gen_range(0..Action::ALL.len())])
        .collect()
}

/// Seeds `1..=n`, the usual pool layout in tests.
pub fn sequential_seeds(n: u64) -> Vec<u64> {
    (1..=n).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
