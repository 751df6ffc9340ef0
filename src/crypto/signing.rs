use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ReputationError, Result, SignerError};

/// Wallet/signing provider seen by the core.
///
/// `address` returning `None` means no active session.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    async fn address(&self) -> Option<String>;

    async fn request_chain_id(&self) -> std::result::Result<u64, SignerError>;

    /// Suspends until the user approves or declines
    async fn sign_message(&self, message: &str) -> std::result::Result<WalletSignature, SignerError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSignature {
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
    pub algorithm: String,
}

impl WalletSignature {
    /// Check this signature against `message`
    pub fn verify(&self, message: &str) -> Result<bool> {
        let public_key_bytes: [u8; 32] = self
            .public_key
            .clone()
            .try_into()
            .map_err(|_| ReputationError::Signer("invalid public key length".to_string()))?;
        let public_key = VerifyingKey::from_bytes(&public_key_bytes)
            .map_err(|e| ReputationError::Signer(format!("invalid public key: {}", e)))?;

        let signature_bytes: [u8; 64] = self
            .signature
            .clone()
            .try_into()
            .map_err(|_| ReputationError::Signer("invalid signature length".to_string()))?;
        let sig = Signature::from_bytes(&signature_bytes);

        Ok(public_key.verify(message.as_bytes(), &sig).is_ok())
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.signature))
    }
}

/// Behaviour of a [`LocalWallet`] towards incoming requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletMode {
    Connected,
    Disconnected,
    /// Connected, but the user declines every signature prompt
    Declining,
}

/// In-process ed25519 wallet implementing [`WalletSigner`]
pub struct LocalWallet {
    secret_key: SigningKey,
    public_key: VerifyingKey,
    chain_id: u64,
    mode: RwLock<WalletMode>,
    sign_requests: AtomicUsize,
}

impl LocalWallet {
    /// Generate a fresh key pair
    pub fn generate(chain_id: u64) -> Self {
        let mut secret_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut secret_bytes);
        Self::from_secret(secret_bytes, chain_id)
    }

    pub fn from_secret(secret_bytes: [u8; 32], chain_id: u64) -> Self {
        let secret_key = SigningKey::from_bytes(&secret_bytes);
        let public_key = secret_key.verifying_key();

        Self {
            secret_key,
            public_key,
            chain_id,
            mode: RwLock::new(WalletMode::Connected),
            sign_requests: AtomicUsize::new(0),
        }
    }

    pub fn with_mode(self, mode: WalletMode) -> Self {
        Self {
            mode: RwLock::new(mode),
            ..self
        }
    }

    pub async fn set_mode(&self, mode: WalletMode) {
        *self.mode.write().await = mode;
    }

    /// Address derived from the public key, independent of mode
    pub fn account_address(&self) -> String {
        address_from_public_key(&self.public_key)
    }

    /// Number of signature prompts shown so far
    pub fn sign_requests(&self) -> usize {
        self.sign_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSigner for LocalWallet {
    async fn address(&self) -> Option<String> {
        match *self.mode.read().await {
            WalletMode::Disconnected => None,
            WalletMode::Connected | WalletMode::Declining => Some(self.account_address()),
        }
    }

    async fn request_chain_id(&self) -> std::result::Result<u64, SignerError> {
        match *self.mode.read().await {
            WalletMode::Disconnected => Err(SignerError::NoAccount),
            _ => Ok(self.chain_id),
        }
    }

    async fn sign_message(&self, message: &str) -> std::result::Result<WalletSignature, SignerError> {
        self.sign_requests.fetch_add(1, Ordering::SeqCst);

        match *self.mode.read().await {
            WalletMode::Disconnected => return Err(SignerError::NoAccount),
            WalletMode::Declining => return Err(SignerError::Declined),
            WalletMode::Connected => {}
        }

        let signature = self.secret_key.sign(message.as_bytes());
        debug!(signer = %self.account_address(), "Signed challenge message");

        Ok(WalletSignature {
            signature: signature.to_bytes().to_vec(),
            public_key: self.public_key.to_bytes().to_vec(),
            algorithm: "Ed25519".to_string(),
        })
    }
}

/// `0x` + hex of the last 20 bytes of SHA-256(public key)
pub fn address_from_public_key(public_key: &VerifyingKey) -> String {
    let digest = Sha256::digest(public_key.to_bytes());
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Case-insensitive address comparison
pub fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
