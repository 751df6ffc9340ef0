//! Reputation Vault
//!
//! Per-player, per-game behavior reports whose reputation score stays
//! encrypted end-to-end. State transitions are computed directly on the
//! encrypted value; plaintext is only revealed to a viewer who signs a
//! challenge.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── config.rs      - Configuration and logging setup
//! ├── error.rs       - Error taxonomy
//! ├── vault.rs       - Component wiring from configuration
//! ├── crypto/        - Score cryptography
//! │   ├── codec.rs     - Encrypted value codec (pluggable cipher)
//! │   ├── transform.rs - Penalty/bonus/reset on encrypted scores
//! │   ├── signing.rs   - Wallet signer capability, local ed25519 wallet
//! │   └── reveal.rs    - Signature-gated decryption
//! ├── store/         - Key-value persistence
//! │   ├── kv.rs        - Store protocol and in-memory store
//! │   └── records.rs   - Record/index mapping
//! └── reputation/    - Record lifecycle
//!     ├── record.rs    - Records, statuses, filters, stats
//!     └── manager.rs   - State machine orchestrator
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod reputation;
pub mod store;
pub mod vault;

pub use config::{VaultConfig, init_logging, sanitize_for_logging};
pub use error::{ReputationError, Result, SignerError, StoreError};
pub use vault::ReputationVault;

// Re-export crypto types
pub use crypto::{
    DecryptionGate, EncryptedValue, LocalWallet, RevealReceipt, ScoreCipher, SessionParams,
    TaggedBase64Cipher, TransformEngine, TransformOp, WalletMode, WalletSignature, WalletSigner,
};

// Re-export store types
pub use store::{KeyValueStore, MemoryStore, RecordStore, StoreLayout, TxReceipt};

// Re-export reputation types
pub use reputation::{
    ManagerOptions, NewReport, ReconcileReport, RecordFilter, RecordStats, RecordStatus,
    ReputationManager, ReputationRecord, Transition,
};
