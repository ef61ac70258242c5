//! Parameter fingerprinting — deterministic identity of a parameter set.
//!
//! Used as the memoization key for recomputation: two parameter sets with the
//! same fingerprint produce identical projections, metrics and simulations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::params::SimulationParameters;

/// BLAKE3 hex digest of the canonical JSON of a parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamsFingerprint(pub String);

impl ParamsFingerprint {
    pub fn of(params: &SimulationParameters) -> Self {
        // Struct fields serialize in declaration order, so the JSON is canonical.
        // No maps and no fallible serializers, so this cannot fail. Non-finite
        // floats serialize as `null`.
        let json = serde_json::to_string(params)
            .expect("SimulationParameters has no map keys or fallible fields to serialize");
        Self(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// First 12 hex characters, for log lines and directory names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ParamsFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SimulationParameters {
    pub fn fingerprint(&self) -> ParamsFingerprint {
        ParamsFingerprint::of(self)
    }
}
