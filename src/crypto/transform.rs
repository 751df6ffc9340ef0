//! Score transforms computed over encrypted values
//!
//! Callers hand in an [`EncryptedValue`] and get a new one back; the
//! plaintext exists only inside [`TransformEngine::apply`].

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::crypto::codec::{EncryptedValue, ScoreCipher};
use crate::error::Result;

/// Score assigned by [`TransformOp::Reset`]
pub const RESET_SCORE: f64 = 100.0;

const PENALTY_FACTOR: f64 = 0.9;
const BONUS_FACTOR: f64 = 1.1;

/// Named operation applied to an encrypted score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformOp {
    /// Multiply by 0.9
    Penalty,
    /// Multiply by 1.1
    Bonus,
    /// Replace with [`RESET_SCORE`]
    Reset,
    /// Any other name; leaves the score unchanged
    Unknown(String),
}

impl TransformOp {
    /// Plaintext rule for this operation
    pub fn compute(&self, value: f64) -> f64 {
        match self {
            TransformOp::Penalty => value * PENALTY_FACTOR,
            TransformOp::Bonus => value * BONUS_FACTOR,
            TransformOp::Reset => RESET_SCORE,
            TransformOp::Unknown(_) => value,
        }
    }
}

impl FromStr for TransformOp {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "penalty" | "penalty10%" => TransformOp::Penalty,
            "bonus" | "bonus10%" => TransformOp::Bonus,
            "reset" => TransformOp::Reset,
            other => TransformOp::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformOp::Penalty => f.write_str("penalty"),
            TransformOp::Bonus => f.write_str("bonus"),
            TransformOp::Reset => f.write_str("reset"),
            TransformOp::Unknown(name) => f.write_str(name),
        }
    }
}

/// Applies [`TransformOp`]s through a pluggable [`ScoreCipher`]
#[derive(Clone)]
pub struct TransformEngine {
    cipher: Arc<dyn ScoreCipher>,
}

impl TransformEngine {
    pub fn new(cipher: Arc<dyn ScoreCipher>) -> Self {
        Self { cipher }
    }

    pub fn cipher(&self) -> &Arc<dyn ScoreCipher> {
        &self.cipher
    }

    /// Decode, apply the rule for `op`, re-encode.
    ///
    /// Fails only when `value` itself is malformed. Results are not clamped.
    pub fn apply(&self, value: &EncryptedValue, op: &TransformOp) -> Result<EncryptedValue> {
        let plain = self.cipher.decrypt(value)?;
        let transformed = self.cipher.encrypt(op.compute(plain));

        debug!(
            op = %op,
            scheme = self.cipher.scheme(),
            "Applied encrypted score transform"
        );

        Ok(transformed)
    }
}
