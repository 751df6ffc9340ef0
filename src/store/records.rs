//! Record Store Adapter - maps reputation records onto the key-value store
//!
//! Layout:
//! - `reputation_keys`: JSON array of record ids (the index)
//! - `reputation_{id}`: one JSON object per record
//!
//! Reads never fail on bad data: a missing or malformed index is empty and a
//! missing or malformed record is absent. An unavailable store reads as empty.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::crypto::EncryptedValue;
use crate::error::{ReputationError, Result, StoreError};
use crate::reputation::{RecordStatus, ReputationRecord};
use crate::store::kv::{KeyValueStore, TxReceipt};

pub const DEFAULT_INDEX_KEY: &str = "reputation_keys";
pub const DEFAULT_RECORD_PREFIX: &str = "reputation_";

/// Key names used in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLayout {
    pub index_key: String,
    pub record_prefix: String,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            index_key: DEFAULT_INDEX_KEY.to_string(),
            record_prefix: DEFAULT_RECORD_PREFIX.to_string(),
        }
    }
}

/// On-store JSON shape of a record. The id lives in the key, not the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    score: String,
    timestamp: i64,
    player_address: String,
    game_id: String,
    behavior_type: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    version: u64,
}

impl StoredRecord {
    fn from_record(record: &ReputationRecord) -> Self {
        Self {
            score: record.encrypted_score.as_str().to_string(),
            timestamp: record.timestamp,
            player_address: record.player_address.clone(),
            game_id: record.game_id.clone(),
            behavior_type: record.behavior_type.clone(),
            status: Some(record.status.as_str().to_string()),
            version: record.version,
        }
    }

    fn into_record(self, id: &str) -> std::result::Result<ReputationRecord, String> {
        let status = match self.status.as_deref() {
            None | Some("") => RecordStatus::Pending,
            Some(raw) => raw.parse().map_err(|e: ReputationError| e.to_string())?,
        };

        Ok(ReputationRecord {
            id: id.to_string(),
            encrypted_score: EncryptedValue::new(self.score),
            timestamp: self.timestamp,
            player_address: self.player_address,
            game_id: self.game_id,
            behavior_type: self.behavior_type,
            status,
            version: self.version,
        })
    }
}

/// Parse stored bytes into a record
pub fn decode_record(id: &str, bytes: &[u8]) -> std::result::Result<ReputationRecord, String> {
    let text = std::str::from_utf8(bytes).map_err(|_| "record bytes are not utf-8".to_string())?;
    let stored: StoredRecord =
        serde_json::from_str(text).map_err(|e| format!("invalid record json: {}", e))?;
    stored.into_record(id)
}

pub fn encode_record(record: &ReputationRecord) -> Result<Vec<u8>> {
    serde_json::to_vec(&StoredRecord::from_record(record))
        .map_err(|e| ReputationError::PersistenceFailure(format!("failed to encode record: {}", e)))
}

pub struct RecordStore {
    store: Arc<dyn KeyValueStore>,
    layout: StoreLayout,
    parallel_reads: bool,
}

impl RecordStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_layout(store, StoreLayout::default())
    }

    pub fn with_layout(store: Arc<dyn KeyValueStore>, layout: StoreLayout) -> Self {
        Self {
            store,
            layout,
            parallel_reads: true,
        }
    }

    /// Read records one after another instead of concurrently
    pub fn sequential_reads(mut self) -> Self {
        self.parallel_reads = false;
        self
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn record_key(&self, id: &str) -> String {
        format!("{}{}", self.layout.record_prefix, id)
    }

    pub async fn is_available(&self) -> bool {
        self.store.is_available().await
    }

    /// Ordered ids from the index; empty when missing, malformed or unavailable
    pub async fn read_index(&self) -> Result<Vec<String>> {
        let Some(bytes) = self.read_raw(&self.layout.index_key).await? else {
            return Ok(Vec::new());
        };

        let text = match std::str::from_utf8(&bytes) {
            Ok(text) => text,
            Err(_) => {
                warn!(key = %self.layout.index_key, "Index bytes are not utf-8, treating as empty");
                return Ok(Vec::new());
            }
        };

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<String>>(text) {
            Ok(ids) => {
                debug!(count = ids.len(), "Read reputation index");
                Ok(ids)
            }
            Err(e) => {
                warn!(key = %self.layout.index_key, error = %e, "Malformed index, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Overwrite the whole index. Callers read-modify-write.
    pub async fn write_index(&self, ids: &[String]) -> Result<TxReceipt> {
        let bytes = serde_json::to_vec(ids)
            .map_err(|e| ReputationError::PersistenceFailure(format!("failed to encode index: {}", e)))?;
        self.write_raw(&self.layout.index_key, bytes).await
    }

    /// The record stored under `id`, or `None` when missing or malformed
    pub async fn read_record(&self, id: &str) -> Result<Option<ReputationRecord>> {
        let key = self.record_key(id);
        let Some(bytes) = self.read_raw(&key).await? else {
            return Ok(None);
        };

        match decode_record(id, &bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(record_id = %id, error = %e, "Skipping malformed record");
                Ok(None)
            }
        }
    }

    /// True when any bytes are stored for `id`, parseable or not
    pub async fn record_exists(&self, id: &str) -> Result<bool> {
        Ok(self.read_raw(&self.record_key(id)).await?.is_some())
    }

    pub async fn write_record(&self, record: &ReputationRecord) -> Result<TxReceipt> {
        let bytes = encode_record(record)?;
        self.write_raw(&self.record_key(&record.id), bytes).await
    }

    /// Read every id, keeping index order. Absent, malformed and unreadable
    /// records are dropped.
    pub async fn read_records(&self, ids: &[String]) -> Result<Vec<ReputationRecord>> {
        let results = if self.parallel_reads {
            join_all(ids.iter().map(|id| self.read_record(id))).await
        } else {
            let mut results = Vec::with_capacity(ids.len());
            for id in ids {
                results.push(self.read_record(id).await);
            }
            results
        };

        let mut records = Vec::with_capacity(results.len());
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    warn!(record_id = %id, error = %e, "Error loading record, skipping");
                }
            }
        }
        Ok(records)
    }

    /// Bytes under `key`; `None` for empty values and an unavailable store
    async fn read_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if !self.store.is_available().await {
            warn!(key = %key, "Store unavailable, reporting no data");
            return Ok(None);
        }

        match self.store.get_data(key).await {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(StoreError::Unavailable) => {
                warn!(key = %key, "Store became unavailable during read");
                Ok(None)
            }
            Err(e) => Err(ReputationError::from_read(e)),
        }
    }

    async fn write_raw(&self, key: &str, bytes: Vec<u8>) -> Result<TxReceipt> {
        let receipt = self.store.set_data(key, bytes).await?;
        debug!(key = %key, tx = %receipt.tx_hash, "Wrote store key");
        Ok(receipt)
    }
}
