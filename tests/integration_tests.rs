//! Integration tests for the reputation vault
//!
//! These tests drive the lifecycle manager, record store and decryption gate
//! together against the in-memory store and a local wallet, covering the
//! record state machine, index integrity, listing resilience, concurrency
//! and signature-gated reveals.

use async_trait::async_trait;
use futures::future::join_all;
use reputation_vault::{
    DecryptionGate, EncryptedValue, KeyValueStore, LocalWallet, MemoryStore, NewReport,
    RecordFilter, RecordStatus, RecordStore, ReputationError, ReputationManager,
    ReputationRecord, ScoreCipher, SessionParams, StoreError, TaggedBase64Cipher,
    TransformEngine, TransformOp, TxReceipt, WalletMode,
};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// Test Helpers
// ============================================================================

fn cipher() -> Arc<TaggedBase64Cipher> {
    Arc::new(TaggedBase64Cipher::new())
}

fn decrypt(value: &EncryptedValue) -> f64 {
    TaggedBase64Cipher::new().decrypt(value).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9 * b.abs().max(1.0)
}

fn manager_over(store: Arc<dyn KeyValueStore>, wallet: Arc<LocalWallet>) -> ReputationManager {
    ReputationManager::new(RecordStore::new(store), TransformEngine::new(cipher()), wallet)
}

/// Manager over a fresh in-memory store with a connected wallet
fn create_test_manager() -> (Arc<MemoryStore>, Arc<LocalWallet>, ReputationManager) {
    let store = Arc::new(MemoryStore::new());
    let wallet = Arc::new(LocalWallet::generate(11155111));
    let manager = manager_over(store.clone(), wallet.clone());
    (store, wallet, manager)
}

/// A record with an explicit timestamp, written straight through the adapter
fn seeded_record(id: &str, timestamp: i64, owner: &str) -> ReputationRecord {
    ReputationRecord {
        id: id.to_string(),
        encrypted_score: TaggedBase64Cipher::new().encrypt(100.0),
        timestamp,
        player_address: owner.to_string(),
        game_id: "arena".to_string(),
        behavior_type: "griefing".to_string(),
        status: RecordStatus::Pending,
        version: 0,
    }
}

fn session() -> SessionParams {
    SessionParams {
        public_key: "0xfeed".to_string(),
        contract_address: "0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string(),
        chain_id: 11155111,
        start_timestamp: 1_735_689_600,
        duration_days: 30,
    }
}

/// Store whose second read of the watched key returns a bumped version,
/// simulating a writer outside this process committing mid-transition.
struct RacingStore {
    inner: MemoryStore,
    watched: StdMutex<Option<String>>,
    reads: AtomicUsize,
}

impl RacingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            watched: StdMutex::new(None),
            reads: AtomicUsize::new(0),
        }
    }

    fn watch(&self, key: String) {
        *self.watched.lock().unwrap() = Some(key);
        self.reads.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for RacingStore {
    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn get_data(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let bytes = self.inner.get_data(key).await?;
        let watched = self.watched.lock().unwrap().clone();

        if watched.as_deref() == Some(key) && self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
            let mut json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            json["version"] = serde_json::json!(7);
            let raced = serde_json::to_vec(&json).unwrap();
            self.inner.poke(key, raced.clone()).await;
            return Ok(raced);
        }

        Ok(bytes)
    }

    async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<TxReceipt, StoreError> {
        self.inner.set_data(key, value).await
    }
}

/// Store that goes away on the second read of the watched key, between a
/// transition's first load and its pre-commit version check.
struct VanishingStore {
    inner: MemoryStore,
    watched: StdMutex<Option<String>>,
    reads: AtomicUsize,
}

impl VanishingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            watched: StdMutex::new(None),
            reads: AtomicUsize::new(0),
        }
    }

    fn watch(&self, key: String) {
        *self.watched.lock().unwrap() = Some(key);
        self.reads.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for VanishingStore {
    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn get_data(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let watched = self.watched.lock().unwrap().clone();
        if watched.as_deref() == Some(key) && self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
            self.inner.set_available(false);
        }
        self.inner.get_data(key).await
    }

    async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<TxReceipt, StoreError> {
        self.inner.set_data(key, value).await
    }
}

// ============================================================================
// Codec & Transform Tests
// ============================================================================

#[test]
fn test_round_trip_whole_score_range() {
    let cipher = TaggedBase64Cipher::new();
    for plain in (0..=10_000).map(|v| v as f64) {
        assert!(approx(cipher.decrypt(&cipher.encrypt(plain)).unwrap(), plain));
    }
    assert!(approx(cipher.decrypt(&cipher.encrypt(3.3333)).unwrap(), 3.3333));
}

#[test]
fn test_legacy_plain_decimal() {
    assert_eq!(decrypt(&EncryptedValue::from("42")), 42.0);
}

#[test]
fn test_transform_rules() {
    let engine = TransformEngine::new(cipher());
    let hundred = engine.cipher().encrypt(100.0);

    assert!(approx(decrypt(&engine.apply(&hundred, &TransformOp::Penalty).unwrap()), 90.0));
    assert!(approx(decrypt(&engine.apply(&hundred, &TransformOp::Bonus).unwrap()), 110.0));

    let anything = engine.cipher().encrypt(1234.5);
    assert_eq!(decrypt(&engine.apply(&anything, &TransformOp::Reset).unwrap()), 100.0);

    let unknown: TransformOp = "unknown".parse().unwrap();
    assert_eq!(decrypt(&engine.apply(&anything, &unknown).unwrap()), 1234.5);
}

#[test]
fn test_transform_rejects_malformed_input() {
    let engine = TransformEngine::new(cipher());
    let err = engine
        .apply(&EncryptedValue::from("FHE-%%%"), &TransformOp::Bonus)
        .unwrap_err();
    assert!(matches!(err, ReputationError::MalformedCiphertext(_)));
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_full_lifecycle() {
    let (_, wallet, manager) = create_test_manager();

    let id = manager
        .create(NewReport::new("arena", "teamwork", 100.0))
        .await
        .unwrap();

    let fresh = manager.get(&id).await.unwrap();
    assert_eq!(fresh.status, RecordStatus::Pending);
    assert_eq!(fresh.player_address, wallet.account_address());
    assert_eq!(fresh.game_id, "arena");
    assert_eq!(fresh.behavior_type, "teamwork");

    let verified = manager.verify(&id).await.unwrap();
    assert_eq!(verified.status, RecordStatus::Verified);
    assert!(approx(decrypt(&verified.encrypted_score), 110.0));
    assert_eq!(verified.timestamp, fresh.timestamp);

    let reset = manager.reset(&id).await.unwrap();
    assert_eq!(reset.status, RecordStatus::Verified);
    assert_eq!(decrypt(&reset.encrypted_score), 100.0);
    assert_eq!(reset.version, 2);
}

#[tokio::test]
async fn test_reject_then_reset() {
    let (_, _, manager) = create_test_manager();
    let id = manager
        .create(NewReport::new("arena", "cheating", 60.0))
        .await
        .unwrap();

    let rejected = manager.reject(&id).await.unwrap();
    assert_eq!(rejected.status, RecordStatus::Rejected);
    assert!(approx(decrypt(&rejected.encrypted_score), 54.0));

    let reset = manager.reset(&id).await.unwrap();
    assert_eq!(reset.status, RecordStatus::Verified);
    assert_eq!(decrypt(&reset.encrypted_score), 100.0);
}

#[tokio::test]
async fn test_index_integrity_after_create() {
    let (_, _, manager) = create_test_manager();
    let first = manager.create(NewReport::new("a", "x", 1.0)).await.unwrap();
    let second = manager.create(NewReport::new("b", "y", 2.0)).await.unwrap();

    let index = manager.records().read_index().await.unwrap();
    assert_eq!(index, vec![first.clone(), second.clone()]);

    let stored = manager.records().read_record(&second).await.unwrap().unwrap();
    assert_eq!(stored.status, RecordStatus::Pending);
}

#[tokio::test]
async fn test_ownership_enforced_case_insensitively() {
    let store = Arc::new(MemoryStore::new());
    let owner = Arc::new(LocalWallet::from_secret([3u8; 32], 1));
    let manager = manager_over(store.clone(), owner.clone());

    // Seed a record whose stored owner address is upper-cased
    let upper = owner.account_address().to_uppercase().replacen("0X", "0x", 1);
    manager
        .records()
        .write_record(&seeded_record("r1", 10, &upper))
        .await
        .unwrap();
    manager.records().write_index(&["r1".to_string()]).await.unwrap();

    assert!(manager.verify("r1").await.is_ok());

    let stranger = manager_over(store, Arc::new(LocalWallet::from_secret([4u8; 32], 1)));
    let err = stranger.reset("r1").await.unwrap_err();
    assert!(matches!(err, ReputationError::NotOwner { ref id, .. } if id == "r1"));
}

#[tokio::test]
async fn test_create_requires_session_and_fields() {
    let (_, wallet, manager) = create_test_manager();

    let err = manager
        .create(NewReport::new("arena", "", 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ReputationError::InvalidInput(_)));

    wallet.set_mode(WalletMode::Disconnected).await;
    let err = manager
        .create(NewReport::new("arena", "afk", 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ReputationError::Unauthenticated));
    assert!(manager.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_index_write_failure_leaves_invisible_orphan() {
    let (store, _, manager) = create_test_manager();
    store.fail_writes_to("reputation_keys").await;

    let err = manager
        .create(NewReport::new("arena", "afk", 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ReputationError::PersistenceFailure(_)));

    // Record bytes landed, but nothing enumerates them
    assert_eq!(store.write_count(), 1);
    assert!(manager.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_record_write_failure_surfaces() {
    let (store, _, manager) = create_test_manager();
    let id = manager.create(NewReport::new("arena", "afk", 1.0)).await.unwrap();
    store.fail_writes_to(&format!("reputation_{}", id)).await;

    let err = manager.verify(&id).await.unwrap_err();
    assert!(matches!(err, ReputationError::PersistenceFailure(_)));
    assert_eq!(manager.get(&id).await.unwrap().status, RecordStatus::Pending);
}

// ============================================================================
// Listing Tests
// ============================================================================

#[tokio::test]
async fn test_list_orders_by_timestamp_descending() {
    let (_, _, manager) = create_test_manager();
    for (id, ts) in [("five", 5), ("one", 1), ("three", 3)] {
        manager
            .records()
            .write_record(&seeded_record(id, ts, "0xabc"))
            .await
            .unwrap();
    }
    manager
        .records()
        .write_index(&["five".to_string(), "one".to_string(), "three".to_string()])
        .await
        .unwrap();

    let ids: Vec<String> = manager.list().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["five", "three", "one"]);
}

#[tokio::test]
async fn test_list_ties_keep_index_order() {
    let (_, _, manager) = create_test_manager();
    for id in ["b", "a", "c"] {
        manager
            .records()
            .write_record(&seeded_record(id, 9, "0xabc"))
            .await
            .unwrap();
    }
    manager
        .records()
        .write_index(&["b".to_string(), "a".to_string(), "c".to_string()])
        .await
        .unwrap();

    let ids: Vec<String> = manager.list().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["b", "a", "c"]);
}

#[tokio::test]
async fn test_list_skips_malformed_records() {
    let (store, _, manager) = create_test_manager();
    let good = manager.create(NewReport::new("arena", "afk", 1.0)).await.unwrap();

    store.poke("reputation_corrupt", "<<not json>>").await;
    let mut index = manager.records().read_index().await.unwrap();
    index.push("corrupt".to_string());
    index.push("missing".to_string());
    manager.records().write_index(&index).await.unwrap();

    let listed = manager.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, good);
}

#[tokio::test]
async fn test_list_survives_record_read_errors() {
    let (store, _, manager) = create_test_manager();
    let good = manager.create(NewReport::new("arena", "afk", 1.0)).await.unwrap();

    manager
        .records()
        .write_record(&seeded_record("flaky", 1, "0xabc"))
        .await
        .unwrap();
    let mut index = manager.records().read_index().await.unwrap();
    index.push("flaky".to_string());
    manager.records().write_index(&index).await.unwrap();
    store.fail_reads_from("reputation_flaky").await;

    let listed = manager.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, good);

    // Direct lookups still report the read error
    assert!(matches!(
        manager.get("flaky").await,
        Err(ReputationError::ReadFailure(_))
    ));
    assert_eq!(manager.stats().await.unwrap().total, 1);
}

#[tokio::test]
async fn test_unindexed_record_is_invisible() {
    let (_, _, manager) = create_test_manager();
    manager
        .records()
        .write_record(&seeded_record("stray", 1, "0xabc"))
        .await
        .unwrap();

    assert!(manager.list().await.unwrap().is_empty());
    assert!(matches!(
        manager.get("stray").await,
        Err(ReputationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_filter_and_stats() {
    let (_, _, manager) = create_test_manager();
    let a = manager.create(NewReport::new("Chess", "toxicity", 50.0)).await.unwrap();
    let b = manager.create(NewReport::new("Go", "toxicity", 50.0)).await.unwrap();
    manager.create(NewReport::new("Chess", "afk", 50.0)).await.unwrap();
    manager.verify(&a).await.unwrap();
    manager.reject(&b).await.unwrap();

    let chess = manager
        .list_filtered(&RecordFilter {
            search: Some("chess".to_string()),
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(chess.len(), 2);

    let rejected_toxic = manager
        .list_filtered(&RecordFilter {
            search: Some("TOXIC".to_string()),
            status: Some(RecordStatus::Rejected),
        })
        .await
        .unwrap();
    assert_eq!(rejected_toxic.len(), 1);
    assert_eq!(rejected_toxic[0].id, b);

    let stats = manager.stats().await.unwrap();
    assert_eq!((stats.total, stats.pending, stats.verified, stats.rejected), (3, 1, 1, 1));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_creates_are_all_indexed() {
    let (_, _, manager) = create_test_manager();

    let results = join_all(
        (0..16).map(|i| manager.create(NewReport::new(format!("game-{}", i), "afk", i as f64))),
    )
    .await;
    let ids: Vec<String> = results.into_iter().map(|r| r.unwrap()).collect();

    let index = manager.records().read_index().await.unwrap();
    assert_eq!(index.len(), 16);
    for id in &ids {
        assert_eq!(index.iter().filter(|i| *i == id).count(), 1);
    }
}

#[tokio::test]
async fn test_concurrent_transitions_on_one_record_serialize() {
    let (_, _, manager) = create_test_manager();
    let id = manager.create(NewReport::new("arena", "afk", 100.0)).await.unwrap();

    let (verified, rejected) = tokio::join!(manager.verify(&id), manager.reject(&id));
    let outcomes = [verified.is_ok(), rejected.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);

    let loser = if verified.is_ok() { rejected } else { verified };
    assert!(matches!(
        loser,
        Err(ReputationError::InvalidTransition { .. })
    ));
    assert_eq!(manager.get(&id).await.unwrap().version, 1);
}

#[tokio::test]
async fn test_external_writer_causes_conflict() {
    let store = Arc::new(RacingStore::new());
    let manager = manager_over(store.clone(), Arc::new(LocalWallet::generate(1)));
    let id = manager.create(NewReport::new("arena", "afk", 100.0)).await.unwrap();

    store.watch(format!("reputation_{}", id));
    let err = manager.verify(&id).await.unwrap_err();
    assert!(matches!(
        err,
        ReputationError::Conflict { expected: 0, found: 7, .. }
    ));

    // The outside write is what remains
    let current = manager.get(&id).await.unwrap();
    assert_eq!(current.version, 7);
    assert_eq!(current.status, RecordStatus::Pending);
}

#[tokio::test]
async fn test_store_lost_before_commit_is_unavailable() {
    let store = Arc::new(VanishingStore::new());
    let manager = manager_over(store.clone(), Arc::new(LocalWallet::generate(1)));
    let id = manager.create(NewReport::new("arena", "afk", 100.0)).await.unwrap();

    store.watch(format!("reputation_{}", id));
    let err = manager.verify(&id).await.unwrap_err();
    assert!(matches!(err, ReputationError::StoreUnavailable));

    store.inner.set_available(true);
    let current = manager.get(&id).await.unwrap();
    assert_eq!(current.status, RecordStatus::Pending);
    assert_eq!(current.version, 0);
}

// ============================================================================
// Decryption Gate Tests
// ============================================================================

#[tokio::test]
async fn test_reveal_after_transitions() {
    let (_, wallet, manager) = create_test_manager();
    let id = manager.create(NewReport::new("arena", "afk", 100.0)).await.unwrap();
    manager.reject(&id).await.unwrap();

    let gate = DecryptionGate::new(cipher(), wallet.clone());
    let record = manager.get(&id).await.unwrap();

    let receipt = gate
        .reveal_with_receipt(&record.encrypted_score, &session())
        .await
        .unwrap();
    assert!(approx(receipt.score, 90.0));
    assert_eq!(receipt.challenge_digest, session().challenge_digest());
    assert!(receipt.signature.verify(&session().challenge_message()).unwrap());
    assert_eq!(wallet.sign_requests(), 1);
}

#[tokio::test]
async fn test_reveal_without_session_never_prompts() {
    let wallet = Arc::new(LocalWallet::generate(1).with_mode(WalletMode::Disconnected));
    let gate = DecryptionGate::new(cipher(), wallet.clone());

    let err = gate
        .reveal(&EncryptedValue::from("FHE-MTAw"), &session())
        .await
        .unwrap_err();
    assert!(matches!(err, ReputationError::Unauthenticated));
    assert_eq!(wallet.sign_requests(), 0);
}

#[tokio::test]
async fn test_reveal_declined_by_user() {
    let wallet = Arc::new(LocalWallet::generate(1).with_mode(WalletMode::Declining));
    let gate = DecryptionGate::new(cipher(), wallet.clone());

    let err = gate
        .reveal(&EncryptedValue::from("FHE-MTAw"), &session())
        .await
        .unwrap_err();
    assert!(matches!(err, ReputationError::UserDeclined));
    assert_eq!(wallet.sign_requests(), 1);
}

#[tokio::test]
async fn test_reveal_of_malformed_ciphertext() {
    let wallet = Arc::new(LocalWallet::generate(1));
    let gate = DecryptionGate::new(cipher(), wallet);

    let err = gate
        .reveal(&EncryptedValue::from("FHE-!!"), &session())
        .await
        .unwrap_err();
    assert!(matches!(err, ReputationError::MalformedCiphertext(_)));
}
