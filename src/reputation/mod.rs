//! Encrypted reputation records
//!
//! Tracks per-player, per-game behavior reports whose score stays encrypted
//! through every state change.
//!
//! ## State Machine
//!
//! ```text
//!              verify (×1.1)
//!   ┌─────────┐ ─────────────► ┌──────────┐
//!   │ pending │                │ verified │◄──┐
//!   └─────────┘ ─────────────► └──────────┘   │ reset (=100)
//!              reject (×0.9)   ┌──────────┐   │ from any status
//!                 └──────────► │ rejected │───┘
//!                              └──────────┘
//! ```
//!
//! Only the record's player address may transition it.

mod manager;
mod record;

pub use manager::{
    ManagerOptions, ReconcileReport, ReputationManager, Transition, generate_record_id,
};
pub use record::{NewReport, RecordFilter, RecordStats, RecordStatus, ReputationRecord};
