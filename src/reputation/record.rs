//! Reputation record types
//!
//! A record is one behavior report with an encrypted score. Only the status
//! and the encrypted score change after creation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::{EncryptedValue, same_address};
use crate::error::ReputationError;

/// Review status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Verified,
    Rejected,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Verified => "verified",
            RecordStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = ReputationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecordStatus::Pending),
            "verified" => Ok(RecordStatus::Verified),
            "rejected" => Ok(RecordStatus::Rejected),
            other => Err(ReputationError::InvalidInput(format!(
                "unknown status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub id: String,
    pub encrypted_score: EncryptedValue,
    /// Seconds since epoch
    pub timestamp: i64,
    pub player_address: String,
    pub game_id: String,
    pub behavior_type: String,
    pub status: RecordStatus,
    /// Optimistic concurrency token, bumped on every transition
    pub version: u64,
}

impl ReputationRecord {
    pub fn is_owned_by(&self, address: &str) -> bool {
        same_address(&self.player_address, address)
    }
}

/// Input for creating a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub game_id: String,
    pub behavior_type: String,
    pub initial_score: f64,
}

impl NewReport {
    pub fn new(game_id: impl Into<String>, behavior_type: impl Into<String>, initial_score: f64) -> Self {
        Self {
            game_id: game_id.into(),
            behavior_type: behavior_type.into(),
            initial_score,
        }
    }

    pub fn validate(&self) -> Result<(), ReputationError> {
        if self.game_id.trim().is_empty() {
            return Err(ReputationError::InvalidInput("game id is required".to_string()));
        }
        if self.behavior_type.trim().is_empty() {
            return Err(ReputationError::InvalidInput(
                "behavior type is required".to_string(),
            ));
        }
        if !self.initial_score.is_finite() {
            return Err(ReputationError::InvalidInput(
                "initial score must be a finite number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Search and status filter over listed records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Case-insensitive substring of player address, game id or behavior type
    pub search: Option<String>,
    pub status: Option<RecordStatus>,
}

impl RecordFilter {
    pub fn matches(&self, record: &ReputationRecord) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }

        match self.search.as_deref().map(str::to_lowercase) {
            Some(term) if !term.is_empty() => {
                record.player_address.to_lowercase().contains(&term)
                    || record.game_id.to_lowercase().contains(&term)
                    || record.behavior_type.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

/// Status counts over a set of records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStats {
    pub total: usize,
    pub pending: usize,
    pub verified: usize,
    pub rejected: usize,
}

impl RecordStats {
    pub fn from_records(records: &[ReputationRecord]) -> Self {
        records.iter().fold(Self::default(), |mut stats, record| {
            stats.total += 1;
            match record.status {
                RecordStatus::Pending => stats.pending += 1,
                RecordStatus::Verified => stats.verified += 1,
                RecordStatus::Rejected => stats.rejected += 1,
            }
            stats
        })
    }

    /// Share of records in `status`, 0.0 - 1.0
    pub fn ratio(&self, status: RecordStatus) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let count = match status {
            RecordStatus::Pending => self.pending,
            RecordStatus::Verified => self.verified,
            RecordStatus::Rejected => self.rejected,
        };
        count as f64 / self.total as f64
    }
}
