//! Pure comparison of two observations for reproducibility checks.
//!
//! [`DeterminismVerifier`] performs no I/O. Callers obtain the two
//! observations (two resets with the same seed, or the same reset over two
//! transports) and hand them over here.

use crate::codec::{ObsMismatch, Tolerance};
use crate::types::ObsVariant;

/// Compares observations under the codec's equality rule.
///
/// # Example
///
/// ```
/// use snakepool_core::determinism::DeterminismVerifier;
/// use snakepool_core::types::ObsVariant;
///
/// let verifier = DeterminismVerifier::default();
/// let a = ObsVariant::Dense(vec![0.0, 1.0]);
/// assert!(verifier.verify(&a, &a.clone()));
/// assert!(!verifier.verify(&a, &ObsVariant::Dense(vec![0.0, 0.5])));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeterminismVerifier {
    tolerance: Tolerance,
}

impl DeterminismVerifier {
    pub const fn new(tolerance: Tolerance) -> Self {
        Self { tolerance }
    }

    pub const fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// `true` when `a` and `b` are canonically equal.
    pub fn verify(&self, a: &ObsVariant, b: &ObsVariant) -> bool {
        a.canonical_eq(b, self.tolerance)
    }

    /// Like [`verify`](Self::verify) but reports the first difference.
    pub fn check(&self, a: &ObsVariant, b: &ObsVariant) -> Result<(), ObsMismatch> {
        a.compare(b, self.tolerance)
    }
}
