//! Truth values attached to atoms.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used when comparing truth values.
const TV_EPSILON: f64 = 1e-9;

/// Simple (strength, confidence) truth value.
///
/// The default value is `(1.0, 0.0)`: fully true, with no evidence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TruthValue {
    /// Strength in `[0, 1]`.
    pub strength: f64,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

impl TruthValue {
    /// Create a truth value, clamping both components to `[0, 1]`.
    pub fn new(strength: f64, confidence: f64) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Whether this is the default truth value.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for TruthValue {
    fn default() -> Self {
        Self {
            strength: 1.0,
            confidence: 0.0,
        }
    }
}

impl PartialEq for TruthValue {
    fn eq(&self, other: &Self) -> bool {
        (self.strength - other.strength).abs() < TV_EPSILON
            && (self.confidence - other.confidence).abs() < TV_EPSILON
    }
}

impl fmt::Display for TruthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(stv {} {})", self.strength, self.confidence)
    }
}
