//! Key-value store protocol
//!
//! The external store exposes `getData`, `setData` and an availability flag.
//! Missing keys read back as empty bytes, matching the contract semantics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;

/// Acknowledgement for a completed `set_data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub key: String,
    pub tx_hash: String,
    pub sequence: u64,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn is_available(&self) -> bool;

    /// Empty bytes when the key has never been written
    async fn get_data(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Full overwrite of `key`
    async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<TxReceipt, StoreError>;
}

/// In-memory [`KeyValueStore`] for development and tests.
///
/// Supports toggling availability and injecting read or write failures per key.
#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
    failing_keys: RwLock<HashSet<String>>,
    failing_reads: RwLock<HashSet<String>>,
    available: AtomicBool,
    sequence: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            failing_keys: RwLock::new(HashSet::new()),
            failing_reads: RwLock::new(HashSet::new()),
            available: AtomicBool::new(true),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every subsequent write to `key` fail with a backend error
    pub async fn fail_writes_to(&self, key: &str) {
        self.failing_keys.write().await.insert(key.to_string());
    }

    /// Make every subsequent read of `key` fail with a backend error
    pub async fn fail_reads_from(&self, key: &str) {
        self.failing_reads.write().await.insert(key.to_string());
    }

    pub async fn clear_failures(&self) {
        self.failing_keys.write().await.clear();
        self.failing_reads.write().await.clear();
    }

    /// Write raw bytes, bypassing availability and failure injection
    pub async fn poke(&self, key: &str, value: impl Into<Vec<u8>>) {
        self.data.write().await.insert(key.to_string(), value.into());
    }

    /// Read raw bytes, bypassing availability
    pub async fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.data.read().await.get(key).cloned()
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn get_data(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if !self.is_available().await {
            return Err(StoreError::Unavailable);
        }

        if self.failing_reads.read().await.contains(key) {
            return Err(StoreError::Backend(format!("read of {} timed out", key)));
        }

        Ok(self.data.read().await.get(key).cloned().unwrap_or_default())
    }

    async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<TxReceipt, StoreError> {
        if !self.is_available().await {
            return Err(StoreError::Unavailable);
        }

        if self.failing_keys.read().await.contains(key) {
            return Err(StoreError::Backend(format!("write to {} rejected", key)));
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update(&value);
        hasher.update(sequence.to_le_bytes());
        let tx_hash = format!("0x{}", hex::encode(hasher.finalize()));

        self.data.write().await.insert(key.to_string(), value);
        debug!(key = %key, sequence, "In-memory store write");

        Ok(TxReceipt {
            key: key.to_string(),
            tx_hash,
            sequence,
        })
    }
}
