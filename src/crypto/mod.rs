//! Cryptographic capabilities for reputation scores
//!
//! - Encrypted score codec with a pluggable cipher backend
//! - Transform engine applying penalty/bonus/reset to encrypted scores
//! - Wallet signer capability with a local ed25519 implementation
//! - Decryption gate revealing scores behind a signed challenge

pub mod codec;
pub mod reveal;
pub mod signing;
pub mod transform;

pub use codec::{ENCRYPTED_PREFIX, EncryptedValue, ScoreCipher, TaggedBase64Cipher};
pub use reveal::{DecryptionGate, RevealReceipt, SessionParams, generate_public_key};
pub use signing::{LocalWallet, WalletMode, WalletSignature, WalletSigner, same_address};
pub use transform::{RESET_SCORE, TransformEngine, TransformOp};
