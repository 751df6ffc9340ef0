use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{Level, info, warn};

use crate::reputation::ManagerOptions;
use crate::store::{DEFAULT_INDEX_KEY, DEFAULT_RECORD_PREFIX, StoreLayout};

/// Configuration for the reputation vault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub reputation: ReputationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Mask ciphertexts and signatures in log output
    pub sanitize_logs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Key holding the JSON array of record ids
    pub index_key: String,
    /// Prefix of per-record keys
    pub record_prefix: String,
    /// Read listed records concurrently
    pub parallel_reads: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Length of the signed reveal window
    pub duration_days: u32,
    /// Store contract address included in the reveal challenge
    pub contract_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// Score suggested for new reports
    pub default_initial_score: f64,
    /// Reject transitions by anyone but the record owner
    pub enforce_ownership: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
            },
            store: StoreConfig {
                index_key: DEFAULT_INDEX_KEY.to_string(),
                record_prefix: DEFAULT_RECORD_PREFIX.to_string(),
                parallel_reads: true,
            },
            session: SessionConfig {
                duration_days: 30,
                contract_address: String::new(),
            },
            reputation: ReputationConfig {
                default_initial_score: 100.0,
                enforce_ownership: true,
            },
        }
    }
}

impl VaultConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = env::var("REPUTATION_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(sanitize) = env::var("REPUTATION_SANITIZE_LOGS") {
            config.logging.sanitize_logs = sanitize
                .parse()
                .context("Invalid REPUTATION_SANITIZE_LOGS value")?;
        }

        if let Ok(key) = env::var("REPUTATION_INDEX_KEY") {
            config.store.index_key = key;
        }

        if let Ok(prefix) = env::var("REPUTATION_RECORD_PREFIX") {
            config.store.record_prefix = prefix;
        }

        if let Ok(parallel) = env::var("REPUTATION_PARALLEL_READS") {
            config.store.parallel_reads = parallel
                .parse()
                .context("Invalid REPUTATION_PARALLEL_READS value")?;
        }

        if let Ok(days) = env::var("REPUTATION_SESSION_DURATION_DAYS") {
            config.session.duration_days = days
                .parse()
                .context("Invalid REPUTATION_SESSION_DURATION_DAYS value")?;
        }

        if let Ok(address) = env::var("REPUTATION_CONTRACT_ADDRESS") {
            config.session.contract_address = address;
        } else {
            warn!("REPUTATION_CONTRACT_ADDRESS not set, reveal challenges will carry an empty address");
        }

        if let Ok(score) = env::var("REPUTATION_DEFAULT_SCORE") {
            config.reputation.default_initial_score = score
                .parse()
                .context("Invalid REPUTATION_DEFAULT_SCORE value")?;
        }

        if let Ok(enforce) = env::var("REPUTATION_ENFORCE_OWNERSHIP") {
            config.reputation.enforce_ownership = enforce
                .parse()
                .context("Invalid REPUTATION_ENFORCE_OWNERSHIP value")?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.store.index_key.is_empty() {
            return Err(anyhow::anyhow!("Index key cannot be empty"));
        }

        if self.store.record_prefix.is_empty() {
            return Err(anyhow::anyhow!("Record prefix cannot be empty"));
        }

        if self.store.record_prefix == self.store.index_key {
            return Err(anyhow::anyhow!(
                "Record prefix must differ from the index key: {}",
                self.store.index_key
            ));
        }

        if !(1..=365).contains(&self.session.duration_days) {
            return Err(anyhow::anyhow!(
                "Session duration must be between 1 and 365 days, got {}",
                self.session.duration_days
            ));
        }

        if !self.reputation.default_initial_score.is_finite() {
            return Err(anyhow::anyhow!("Default initial score must be finite"));
        }

        if !self.reputation.enforce_ownership {
            warn!("Ownership enforcement disabled; transitions must be gated upstream");
        }

        Ok(())
    }

    pub fn store_layout(&self) -> StoreLayout {
        StoreLayout {
            index_key: self.store.index_key.clone(),
            record_prefix: self.store.record_prefix.clone(),
        }
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            enforce_ownership: self.reputation.enforce_ownership,
            ..ManagerOptions::default()
        }
    }
}

/// Install a global `tracing` subscriber at the configured level
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let log_level = match config.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt().with_max_level(log_level).finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.sanitize_logs {
        info!("Logging initialized with ciphertext sanitization enabled");
    }

    Ok(())
}

/// Mask the middle of ciphertexts, signatures and keys for logging
pub fn sanitize_for_logging(data: &str) -> String {
    let sensitive = data.starts_with(crate::crypto::ENCRYPTED_PREFIX)
        || (data.starts_with("0x") && data.len() > 42);

    if !sensitive {
        return data.to_string();
    }

    let chars: Vec<char> = data.chars().collect();
    if chars.len() > 20 {
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 6..].iter().collect();
        format!("{}***{}", head, tail)
    } else {
        let keep = chars.len().min(4);
        let head: String = chars[..keep].iter().collect();
        format!("{}***", head)
    }
}
