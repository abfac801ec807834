//! Top-level error taxonomy.

use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// `AdvanceTurn` was called for a turn number that is not the tenant's
    /// current turn. Guards idempotence: a second advance for the same
    /// turn is an error rather than a double resolution.
    #[error("turn mismatch: expected turn {expected}, tenant is at turn {actual}")]
    TurnMismatch { expected: u32, actual: u32 },

    /// A configuration document failed to parse or referenced entities
    /// that do not exist. Nothing was written.
    #[error("configuration rejected: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Store(StoreError::Transient(_)))
    }
}
