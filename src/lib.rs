//! Anonymous Device Registry
//!
//! This library lets IoT sensor devices prove they belong to a registry of
//! approved devices without revealing which device submitted a reading, and
//! rejects replays through per-epoch nullifiers.
//!
//! # Components
//!
//! - [`hash`]: domain-separated SHA-256 used for every protocol hash
//! - [`MerkleTree`] / [`MerkleProof`]: deterministic binary tree with odd-node duplication
//! - [`DeviceRegistry`]: the canonical device set and its published root
//! - [`derive_nullifier`] / [`compute_commitment`] / [`NullifierSet`]: replay protection
//! - [`VerificationGateway`]: accept/reject decision for a submission
//! - [`DeviceStore`]: persistence seam for registered devices
//!
//! # Example
//!
//! ```
//! use msingi_registry::{
//!     derive_nullifier, compute_commitment, DeviceId, DeviceRegistry, NullifierSet,
//!     Submission, VerificationGateway,
//! };
//! use std::sync::Arc;
//!
//! let registry = Arc::new(DeviceRegistry::in_memory());
//! registry.register(DeviceId::from("dev-1"), None).unwrap();
//! registry.register(DeviceId::from("dev-2"), None).unwrap();
//!
//! let proof = registry.get_proof(&DeviceId::from("dev-1")).unwrap();
//! let submission = Submission {
//!     leaf: proof.leaf,
//!     siblings: proof.siblings.clone(),
//!     leaf_index: proof.leaf_index,
//!     claimed_root: proof.root,
//!     nullifier: derive_nullifier(&[0x2A; 32], 1),
//!     commitment: compute_commitment(b"bafy-reading", b"device-key", 1),
//!     quality_score: None,
//! };
//!
//! let gateway = VerificationGateway::new(registry, Arc::new(NullifierSet::new()));
//! assert!(gateway.submit(&submission).unwrap().is_accepted());
//! assert!(!gateway.submit(&submission).unwrap().is_accepted());
//! ```

pub mod config;
pub mod epoch;
pub mod error;
pub mod gateway;
pub mod hash;
pub mod merkle;
pub mod nullifier;
pub mod registry;
pub mod store;
pub mod types;
pub mod utils;

#[cfg(test)]
mod merkle_tests;

pub use config::Config;
pub use epoch::{Clock, FixedClock, SystemClock};
pub use error::{RegistryError, StoreError};
pub use gateway::{Receipt, RejectReason, Submission, SubmissionStage, VerificationGateway, Verdict};
pub use merkle::{MerkleProof, MerkleTree};
pub use nullifier::{compute_commitment, derive_nullifier, DeviceSecret, NullifierSet};
pub use registry::{DeviceRegistry, RegistrySnapshot};
pub use store::{DeviceStore, JsonLinesStore, MemoryStore};
pub use types::{
    DayEpoch, DeviceId, DeviceIdentity, EpochId, Hash, MembershipProofFile, SubmissionFile,
    HASH_SIZE, ZERO_HASH,
};
