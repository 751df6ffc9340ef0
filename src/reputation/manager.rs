//! Reputation Manager - lifecycle orchestrator
//!
//! Owns the record state machine. Scores change only through the transform
//! engine, records and the index only through the record store adapter.
//!
//! Record and index are two separate store writes. A failure after the record
//! write and before the index write leaves an orphaned record that no listing
//! will ever show; [`ReputationManager::reconcile`] repairs the opposite case
//! (index entries whose record is gone).

use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::crypto::{TransformEngine, TransformOp, WalletSigner};
use crate::error::{ReputationError, Result};
use crate::reputation::{
    NewReport, RecordFilter, RecordStats, RecordStatus, ReputationRecord,
};
use crate::store::RecordStore;

const ID_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 7;

/// State transitions applied to an existing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    Verify,
    Reject,
    Reset,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Verify => "verify",
            Transition::Reject => "reject",
            Transition::Reset => "reset",
        }
    }

    pub fn op(&self) -> TransformOp {
        match self {
            Transition::Verify => TransformOp::Bonus,
            Transition::Reject => TransformOp::Penalty,
            Transition::Reset => TransformOp::Reset,
        }
    }

    pub fn target(&self) -> RecordStatus {
        match self {
            Transition::Verify | Transition::Reset => RecordStatus::Verified,
            Transition::Reject => RecordStatus::Rejected,
        }
    }

    /// Verify and reject leave `pending` exactly once; reset works from anywhere
    pub fn allowed_from(&self, status: RecordStatus) -> bool {
        match self {
            Transition::Verify | Transition::Reject => status == RecordStatus::Pending,
            Transition::Reset => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerOptions {
    /// Reject transitions by anyone but the record's player address
    pub enforce_ownership: bool,
    /// Attempts at drawing an id not already in the index
    pub max_id_attempts: u32,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            enforce_ownership: true,
            max_id_attempts: 8,
        }
    }
}

/// Outcome of [`ReputationManager::reconcile`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Index entries with no stored record, removed
    pub dangling: Vec<String>,
    /// Repeated index entries, removed
    pub duplicates: Vec<String>,
    /// Stored but unparseable records, kept in the index
    pub unreadable: Vec<String>,
    pub rewritten: bool,
}

pub struct ReputationManager {
    records: RecordStore,
    engine: TransformEngine,
    signer: Arc<dyn WalletSigner>,
    options: ManagerOptions,

    /// Per-record transition locks, present only while a transition on the
    /// id is in flight
    record_locks: DashMap<String, Arc<Mutex<()>>>,

    /// Serializes index read-modify-write
    index_lock: Mutex<()>,
}

impl ReputationManager {
    pub fn new(records: RecordStore, engine: TransformEngine, signer: Arc<dyn WalletSigner>) -> Self {
        Self {
            records,
            engine,
            signer,
            options: ManagerOptions::default(),
            record_locks: DashMap::new(),
            index_lock: Mutex::new(()),
        }
    }

    pub fn with_options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// File a new report owned by the connected account. Returns the new id.
    pub async fn create(&self, report: NewReport) -> Result<String> {
        let reporter = self.session().await?;
        report.validate()?;
        self.ensure_available().await?;

        let encrypted_score = self.engine.cipher().encrypt(report.initial_score);

        let _index_guard = self.index_lock.lock().await;
        let mut ids = self.records.read_index().await?;
        let id = self.fresh_id(&ids)?;

        let record = ReputationRecord {
            id: id.clone(),
            encrypted_score,
            timestamp: Utc::now().timestamp(),
            player_address: reporter.clone(),
            game_id: report.game_id,
            behavior_type: report.behavior_type,
            status: RecordStatus::Pending,
            version: 0,
        };

        self.records.write_record(&record).await?;

        ids.push(id.clone());
        if let Err(e) = self.records.write_index(&ids).await {
            error!(
                record_id = %id,
                error = %e,
                "Index update failed after record write; record is orphaned"
            );
            return Err(e);
        }

        info!(
            record_id = %id,
            reporter = %reporter,
            game_id = %record.game_id,
            behavior = %record.behavior_type,
            "Created reputation record"
        );

        Ok(id)
    }

    /// pending → verified, score × 1.1
    pub async fn verify(&self, id: &str) -> Result<ReputationRecord> {
        self.transition(id, Transition::Verify).await
    }

    /// pending → rejected, score × 0.9
    pub async fn reject(&self, id: &str) -> Result<ReputationRecord> {
        self.transition(id, Transition::Reject).await
    }

    /// any → verified, score = 100
    pub async fn reset(&self, id: &str) -> Result<ReputationRecord> {
        self.transition(id, Transition::Reset).await
    }

    pub async fn transition(&self, id: &str, transition: Transition) -> Result<ReputationRecord> {
        let caller = self.session().await?;
        self.ensure_available().await?;

        let lock = self.record_lock(id);
        let result = {
            let _record_guard = lock.lock().await;
            self.apply_transition(id, transition, caller).await
        };
        drop(lock);
        self.release_record_lock(id);

        result
    }

    async fn apply_transition(
        &self,
        id: &str,
        transition: Transition,
        caller: String,
    ) -> Result<ReputationRecord> {
        let record = self.load_indexed(id).await?;

        if self.options.enforce_ownership && !record.is_owned_by(&caller) {
            warn!(
                record_id = %id,
                caller = %caller,
                action = transition.name(),
                "Rejected transition by non-owner"
            );
            return Err(ReputationError::NotOwner {
                id: id.to_string(),
                caller,
            });
        }

        if !transition.allowed_from(record.status) {
            return Err(ReputationError::InvalidTransition {
                id: id.to_string(),
                from: record.status,
                action: transition.name(),
            });
        }

        let encrypted_score = self.engine.apply(&record.encrypted_score, &transition.op())?;

        // Another writer outside this process may have committed meanwhile
        let current = match self.records.read_record(id).await? {
            Some(current) => current,
            None if !self.records.is_available().await => {
                warn!(record_id = %id, "Store went away before commit");
                return Err(ReputationError::StoreUnavailable);
            }
            None => return Err(ReputationError::NotFound(id.to_string())),
        };
        if current.version != record.version {
            warn!(
                record_id = %id,
                expected = record.version,
                found = current.version,
                "Concurrent modification detected"
            );
            return Err(ReputationError::Conflict {
                id: id.to_string(),
                expected: record.version,
                found: current.version,
            });
        }

        let from = record.status;
        let updated = ReputationRecord {
            encrypted_score,
            status: transition.target(),
            version: record.version + 1,
            ..record
        };
        self.records.write_record(&updated).await?;

        info!(
            record_id = %id,
            action = transition.name(),
            from = %from,
            to = %updated.status,
            version = updated.version,
            "Applied reputation transition"
        );

        Ok(updated)
    }

    /// A single indexed record
    pub async fn get(&self, id: &str) -> Result<ReputationRecord> {
        self.load_indexed(id).await
    }

    /// All readable indexed records, newest first. Ties keep index order.
    pub async fn list(&self) -> Result<Vec<ReputationRecord>> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = self
            .records
            .read_index()
            .await?
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let mut records = self.records.read_records(&ids).await?;
        if records.len() < ids.len() {
            debug!(
                indexed = ids.len(),
                readable = records.len(),
                "Some indexed records were skipped"
            );
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    pub async fn list_filtered(&self, filter: &RecordFilter) -> Result<Vec<ReputationRecord>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }

    pub async fn stats(&self) -> Result<RecordStats> {
        Ok(RecordStats::from_records(&self.list().await?))
    }

    /// Drop duplicate and dangling index entries, rewriting the index if needed
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        self.session().await?;
        self.ensure_available().await?;

        let _index_guard = self.index_lock.lock().await;
        let ids = self.records.read_index().await?;

        let mut report = ReconcileReport::default();
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(ids.len());

        for id in ids {
            if !seen.insert(id.clone()) {
                report.duplicates.push(id);
                continue;
            }
            if !self.records.record_exists(&id).await? {
                report.dangling.push(id);
                continue;
            }
            if self.records.read_record(&id).await?.is_none() {
                report.unreadable.push(id.clone());
            }
            kept.push(id);
        }

        if !report.dangling.is_empty() || !report.duplicates.is_empty() {
            self.records.write_index(&kept).await?;
            report.rewritten = true;
        }

        info!(
            dangling = report.dangling.len(),
            duplicates = report.duplicates.len(),
            unreadable = report.unreadable.len(),
            rewritten = report.rewritten,
            "Reconciled reputation index"
        );

        Ok(report)
    }

    async fn session(&self) -> Result<String> {
        self.signer
            .address()
            .await
            .ok_or(ReputationError::Unauthenticated)
    }

    async fn ensure_available(&self) -> Result<()> {
        if self.records.is_available().await {
            Ok(())
        } else {
            warn!("Record store unavailable");
            Err(ReputationError::StoreUnavailable)
        }
    }

    async fn load_indexed(&self, id: &str) -> Result<ReputationRecord> {
        let ids = self.records.read_index().await?;
        if !ids.iter().any(|indexed| indexed == id) {
            return Err(ReputationError::NotFound(id.to_string()));
        }

        self.records
            .read_record(id)
            .await?
            .ok_or_else(|| ReputationError::NotFound(id.to_string()))
    }

    fn record_lock(&self, id: &str) -> Arc<Mutex<()>> {
        self.record_locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Drop the entry for `id` once no transition holds or awaits it. Clones
    /// happen under the same shard lock, so a count of one is final.
    fn release_record_lock(&self, id: &str) {
        self.record_locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn fresh_id(&self, existing: &[String]) -> Result<String> {
        for _ in 0..self.options.max_id_attempts {
            let candidate = generate_record_id();
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
        }
        Err(ReputationError::PersistenceFailure(
            "could not allocate a unique record id".to_string(),
        ))
    }
}

/// `<unix-millis>-<7 lowercase base36 chars>`
pub fn generate_record_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_SUFFIX_ALPHABET[rng.gen_range(0..ID_SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}
