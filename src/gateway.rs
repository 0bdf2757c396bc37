//! Accept/reject decision for anonymous contributions.
//!
//! Each submission moves through
//! `Received -> ProofChecked -> NullifierChecked -> Accepted | Rejected`.
//! The Merkle proof is checked before the nullifier so a rejected proof never
//! reveals whether its nullifier was already spent. The nullifier is marked
//! spent only on acceptance, in the same lock acquisition as the check. The
//! whole decision runs under the registry's read lock, so the root a
//! submission is accepted against is still the published one.

use crate::error::RegistryError;
use crate::merkle::verify_proof;
use crate::nullifier::NullifierSet;
use crate::registry::DeviceRegistry;
use crate::types::Hash;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

/// One contribution claim as received from a device or its proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub leaf: Hash,
    pub siblings: Vec<Hash>,
    pub leaf_index: usize,
    pub claimed_root: Hash,
    pub nullifier: Hash,
    pub commitment: Hash,
    /// Passed through to the receipt; reward logic lives with the caller.
    pub quality_score: Option<u8>,
}

/// Where a submission stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Received,
    ProofChecked,
    NullifierChecked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The claimed root is not the published root. Fetch a fresh proof.
    StaleRoot,
    /// The proof does not fold to the published root.
    InvalidProof,
    /// The nullifier was already spent.
    DoubleClaim,
}

impl RejectReason {
    /// The last stage the submission passed before being rejected.
    #[must_use]
    pub fn stage(self) -> SubmissionStage {
        match self {
            RejectReason::StaleRoot | RejectReason::InvalidProof => SubmissionStage::Received,
            RejectReason::DoubleClaim => SubmissionStage::ProofChecked,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectReason::StaleRoot => "stale root",
            RejectReason::InvalidProof => "invalid proof",
            RejectReason::DoubleClaim => "double claim",
        };
        f.write_str(name)
    }
}

/// Record of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub nullifier: Hash,
    pub commitment: Hash,
    pub root: Hash,
    pub registry_version: u64,
    pub quality_score: Option<u8>,
}

/// Final state of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(Receipt),
    Rejected(RejectReason),
}

impl Verdict {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    /// The last stage passed before reaching this verdict.
    #[must_use]
    pub fn last_stage(&self) -> SubmissionStage {
        match self {
            Verdict::Accepted(_) => SubmissionStage::NullifierChecked,
            Verdict::Rejected(reason) => reason.stage(),
        }
    }

    /// Converts a rejection into the matching [`RegistryError`].
    ///
    /// `submission` supplies the values named in the error message.
    pub fn into_result(self, submission: &Submission) -> Result<Receipt, RegistryError> {
        match self {
            Verdict::Accepted(receipt) => Ok(receipt),
            Verdict::Rejected(RejectReason::InvalidProof) => Err(RegistryError::InvalidProof),
            Verdict::Rejected(RejectReason::StaleRoot) => Err(RegistryError::StaleRoot {
                claimed: hex::encode(submission.claimed_root),
            }),
            Verdict::Rejected(RejectReason::DoubleClaim) => Err(RegistryError::DoubleClaim {
                nullifier: hex::encode(submission.nullifier),
            }),
        }
    }
}

/// Checks submissions against a registry and a spent-nullifier set.
#[derive(Clone)]
pub struct VerificationGateway {
    registry: Arc<DeviceRegistry>,
    nullifiers: Arc<NullifierSet>,
}

impl VerificationGateway {
    pub fn new(registry: Arc<DeviceRegistry>, nullifiers: Arc<NullifierSet>) -> Self {
        VerificationGateway {
            registry,
            nullifiers,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn nullifiers(&self) -> &Arc<NullifierSet> {
        &self.nullifiers
    }

    /// Runs one submission to a terminal state.
    ///
    /// Rejections are values, not errors. No retry happens here; a stale
    /// root is resolved by the caller requesting a new proof.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PersistenceFailure`] if an otherwise
    /// acceptable nullifier cannot be journaled. The nullifier stays unspent.
    pub fn submit(&self, submission: &Submission) -> Result<Verdict, RegistryError> {
        let nullifier_hex = hex::encode(submission.nullifier);
        debug!(
            "Submission received: nullifier {}, leaf index {}, {} siblings",
            nullifier_hex,
            submission.leaf_index,
            submission.siblings.len()
        );

        self.registry.with_snapshot(|snapshot| {
            if submission.claimed_root != snapshot.root {
                warn!(
                    "Rejected nullifier {}: stale root {} (published {})",
                    nullifier_hex,
                    hex::encode(submission.claimed_root),
                    hex::encode(snapshot.root)
                );
                return Ok(Verdict::Rejected(RejectReason::StaleRoot));
            }
            if !verify_proof(
                &submission.leaf,
                &submission.siblings,
                submission.leaf_index,
                &snapshot.root,
            ) {
                warn!("Rejected nullifier {nullifier_hex}: invalid proof");
                return Ok(Verdict::Rejected(RejectReason::InvalidProof));
            }
            debug!("Proof checked against root version {}", snapshot.version);

            match self.nullifiers.try_spend(&submission.nullifier) {
                Ok(()) => {}
                Err(RegistryError::DoubleClaim { .. }) => {
                    warn!("Rejected nullifier {nullifier_hex}: double claim");
                    return Ok(Verdict::Rejected(RejectReason::DoubleClaim));
                }
                Err(e) => return Err(e),
            }

            info!(
                "Accepted nullifier {} with commitment {}",
                nullifier_hex,
                hex::encode(submission.commitment)
            );
            Ok(Verdict::Accepted(Receipt {
                nullifier: submission.nullifier,
                commitment: submission.commitment,
                root: snapshot.root,
                registry_version: snapshot.version,
                quality_score: submission.quality_score,
            }))
        })
    }
}
