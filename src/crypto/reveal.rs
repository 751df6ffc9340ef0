//! Signature-gated reveal of encrypted scores
//!
//! A viewer must sign a fixed-format challenge built from the current
//! session parameters before a score is decrypted. The signature is a consent
//! gate: it is returned in the receipt but not verified or stored here.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::crypto::codec::{EncryptedValue, ScoreCipher};
use crate::crypto::signing::{WalletSignature, WalletSigner};
use crate::error::{ReputationError, Result};

/// Bytes of randomness behind a generated session public key (2000 hex chars)
const SESSION_KEY_BYTES: usize = 1000;

/// Parameters a viewer signs over to authorize reveals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    pub public_key: String,
    pub contract_address: String,
    pub chain_id: u64,
    pub start_timestamp: i64,
    pub duration_days: u32,
}

impl SessionParams {
    /// Open a reveal session for the signer's current account
    pub async fn establish(
        signer: &dyn WalletSigner,
        contract_address: &str,
        duration_days: u32,
    ) -> Result<Self> {
        if signer.address().await.is_none() {
            return Err(ReputationError::Unauthenticated);
        }

        let chain_id = signer.request_chain_id().await?;

        Ok(Self {
            public_key: generate_public_key(),
            contract_address: contract_address.to_string(),
            chain_id,
            start_timestamp: Utc::now().timestamp(),
            duration_days,
        })
    }

    /// The exact text the viewer signs, one field per line in fixed order
    pub fn challenge_message(&self) -> String {
        format!(
            "publickey:{}\ncontractAddresses:{}\ncontractsChainId:{}\nstartTimestamp:{}\ndurationDays:{}",
            self.public_key,
            self.contract_address,
            self.chain_id,
            self.start_timestamp,
            self.duration_days
        )
    }

    pub fn challenge_digest(&self) -> String {
        hex::encode(Sha256::digest(self.challenge_message().as_bytes()))
    }

    /// End of the signed window; informational only
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let start = Utc.timestamp_opt(self.start_timestamp, 0).single()?;
        Some(start + Duration::days(self.duration_days as i64))
    }
}

/// `0x` followed by 2000 random lowercase hex characters
pub fn generate_public_key() -> String {
    let mut bytes = vec![0u8; SESSION_KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

/// Outcome of a successful reveal. Lives only in the caller's view state.
#[derive(Debug, Clone)]
pub struct RevealReceipt {
    pub score: f64,
    pub viewer: String,
    pub signature: WalletSignature,
    pub challenge_digest: String,
    pub revealed_at: DateTime<Utc>,
}

pub struct DecryptionGate {
    cipher: Arc<dyn ScoreCipher>,
    signer: Arc<dyn WalletSigner>,
}

impl DecryptionGate {
    pub fn new(cipher: Arc<dyn ScoreCipher>, signer: Arc<dyn WalletSigner>) -> Self {
        Self { cipher, signer }
    }

    /// Reveal the plaintext score after the viewer signs the challenge
    pub async fn reveal(&self, encrypted: &EncryptedValue, params: &SessionParams) -> Result<f64> {
        Ok(self.reveal_with_receipt(encrypted, params).await?.score)
    }

    pub async fn reveal_with_receipt(
        &self,
        encrypted: &EncryptedValue,
        params: &SessionParams,
    ) -> Result<RevealReceipt> {
        let viewer = self
            .signer
            .address()
            .await
            .ok_or(ReputationError::Unauthenticated)?;

        let message = params.challenge_message();
        let challenge_digest = params.challenge_digest();
        debug!(viewer = %viewer, challenge = %challenge_digest, "Requesting reveal signature");

        let signature = self.signer.sign_message(&message).await.map_err(|e| {
            warn!(viewer = %viewer, error = %e, "Reveal signature not obtained");
            ReputationError::from(e)
        })?;

        let score = self.cipher.decrypt(encrypted)?;

        info!(
            viewer = %viewer,
            challenge = %challenge_digest,
            scheme = self.cipher.scheme(),
            "Revealed encrypted score"
        );

        Ok(RevealReceipt {
            score,
            viewer,
            signature,
            challenge_digest,
            revealed_at: Utc::now(),
        })
    }
}
