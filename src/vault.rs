//! Reputation Vault - wires store, cipher and signer from configuration
//!
//! Bundles the lifecycle manager with the decryption gate so a front end has
//! a single handle for writes, listings and reveals.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{VaultConfig, sanitize_for_logging};
use crate::crypto::{
    DecryptionGate, RevealReceipt, ScoreCipher, SessionParams, TransformEngine, WalletSigner,
};
use crate::error::Result;
use crate::reputation::{NewReport, ReputationManager};
use crate::store::{KeyValueStore, RecordStore};

pub struct ReputationVault {
    manager: ReputationManager,
    gate: DecryptionGate,
    signer: Arc<dyn WalletSigner>,
    config: VaultConfig,
}

impl ReputationVault {
    pub fn new(
        config: VaultConfig,
        store: Arc<dyn KeyValueStore>,
        cipher: Arc<dyn ScoreCipher>,
        signer: Arc<dyn WalletSigner>,
    ) -> Self {
        let mut records = RecordStore::with_layout(store, config.store_layout());
        if !config.store.parallel_reads {
            records = records.sequential_reads();
        }

        let manager = ReputationManager::new(
            records,
            TransformEngine::new(cipher.clone()),
            signer.clone(),
        )
        .with_options(config.manager_options());

        let gate = DecryptionGate::new(cipher.clone(), signer.clone());

        info!(
            scheme = cipher.scheme(),
            index_key = %config.store.index_key,
            enforce_ownership = config.reputation.enforce_ownership,
            "Reputation vault initialized"
        );

        Self {
            manager,
            gate,
            signer,
            config,
        }
    }

    pub fn manager(&self) -> &ReputationManager {
        &self.manager
    }

    pub fn gate(&self) -> &DecryptionGate {
        &self.gate
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// A report for `game_id`/`behavior_type` at the configured default score
    pub fn default_report(&self, game_id: &str, behavior_type: &str) -> NewReport {
        NewReport::new(game_id, behavior_type, self.config.reputation.default_initial_score)
    }

    /// Open a reveal session with the configured contract address and window
    pub async fn open_session(&self) -> Result<SessionParams> {
        let session = SessionParams::establish(
            self.signer.as_ref(),
            &self.config.session.contract_address,
            self.config.session.duration_days,
        )
        .await?;

        debug!(
            chain_id = session.chain_id,
            public_key = %self.redact(&session.public_key),
            "Opened reveal session"
        );

        Ok(session)
    }

    /// Reveal the score of an indexed record
    pub async fn reveal_record(&self, id: &str, session: &SessionParams) -> Result<RevealReceipt> {
        let record = self.manager.get(id).await?;
        debug!(
            record_id = %id,
            score = %self.redact(record.encrypted_score.as_str()),
            "Revealing record score"
        );
        self.gate.reveal_with_receipt(&record.encrypted_score, session).await
    }

    fn redact(&self, value: &str) -> String {
        if self.config.logging.sanitize_logs {
            sanitize_for_logging(value)
        } else {
            value.to_string()
        }
    }
}
