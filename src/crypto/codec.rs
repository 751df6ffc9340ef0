//! Encrypted score codec
//!
//! Scores travel as opaque strings. The bundled [`TaggedBase64Cipher`] is a
//! reversible encoding, not confidentiality-preserving encryption; production
//! deployments plug a real homomorphic backend in through [`ScoreCipher`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReputationError, Result};

/// Prefix marking a tagged (encrypted) value
pub const ENCRYPTED_PREFIX: &str = "FHE-";

/// Opaque encrypted score as stored on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedValue(String);

impl EncryptedValue {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the tagged form, false for legacy plain decimals
    pub fn is_tagged(&self) -> bool {
        self.0.starts_with(ENCRYPTED_PREFIX)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EncryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EncryptedValue {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for EncryptedValue {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Capability for turning plaintext scores into opaque values and back.
pub trait ScoreCipher: Send + Sync {
    fn encrypt(&self, plain: f64) -> EncryptedValue;

    fn decrypt(&self, value: &EncryptedValue) -> Result<f64>;

    /// Short name of the backing scheme, used in logs
    fn scheme(&self) -> &'static str;
}

/// `FHE-` + base64(decimal) encoding, accepting legacy untagged decimals
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedBase64Cipher;

impl TaggedBase64Cipher {
    pub fn new() -> Self {
        Self
    }
}

impl ScoreCipher for TaggedBase64Cipher {
    fn encrypt(&self, plain: f64) -> EncryptedValue {
        EncryptedValue(format!(
            "{}{}",
            ENCRYPTED_PREFIX,
            STANDARD.encode(plain.to_string())
        ))
    }

    fn decrypt(&self, value: &EncryptedValue) -> Result<f64> {
        let decimal = match value.as_str().strip_prefix(ENCRYPTED_PREFIX) {
            Some(payload) => {
                let bytes = STANDARD.decode(payload).map_err(|e| {
                    ReputationError::MalformedCiphertext(format!("invalid base64 payload: {}", e))
                })?;
                String::from_utf8(bytes).map_err(|_| {
                    ReputationError::MalformedCiphertext("payload is not utf-8".to_string())
                })?
            }
            None => value.as_str().to_string(),
        };

        parse_decimal(&decimal)
    }

    fn scheme(&self) -> &'static str {
        "tagged-base64"
    }
}

fn parse_decimal(text: &str) -> Result<f64> {
    let parsed: f64 = text.parse().map_err(|_| {
        ReputationError::MalformedCiphertext(format!("not a decimal number: {:?}", text))
    })?;

    if !parsed.is_finite() {
        return Err(ReputationError::MalformedCiphertext(format!(
            "non-finite value: {:?}",
            text
        )));
    }

    Ok(parsed)
}
