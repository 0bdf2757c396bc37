//! Error kinds returned by the registry, nullifier set and verification gateway.

use thiserror::Error;

/// Failure reported by a [`DeviceStore`](crate::store::DeviceStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store record {line} is malformed: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the core. Every failure maps to exactly one kind.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("device {device_id} is already registered")]
    AlreadyRegistered { device_id: String },

    #[error("device {device_id} is not registered")]
    NotRegistered { device_id: String },

    #[error("merkle proof does not fold to the published root")]
    InvalidProof,

    #[error("claimed root {claimed} is not the published root")]
    StaleRoot { claimed: String },

    #[error("nullifier {nullifier} has already been spent")]
    DoubleClaim { nullifier: String },

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    #[error("leaf index {index} is out of range for {len} leaves")]
    LeafIndexOutOfRange { index: usize, len: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RegistryError {
    /// Short stable name of the error kind, safe to log and to expose to callers.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::AlreadyRegistered { .. } => "already_registered",
            RegistryError::NotRegistered { .. } => "not_registered",
            RegistryError::InvalidProof => "invalid_proof",
            RegistryError::StaleRoot { .. } => "stale_root",
            RegistryError::DoubleClaim { .. } => "double_claim",
            RegistryError::PersistenceFailure(_) => "persistence_failure",
            RegistryError::LeafIndexOutOfRange { .. } => "leaf_index_out_of_range",
            RegistryError::InvalidInput(_) => "invalid_input",
        }
    }
}
