//! Persistence over an external append-only key-value store
//!
//! `kv` defines the store protocol; `records` maps reputation records and
//! the record index onto it.

pub mod kv;
pub mod records;

pub use kv::{KeyValueStore, MemoryStore, TxReceipt};
pub use records::{DEFAULT_INDEX_KEY, DEFAULT_RECORD_PREFIX, RecordStore, StoreLayout};
