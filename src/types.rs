//! Type definitions shared across the registry, tree engine and gateway.

use crate::gateway::Submission;
use crate::hash::leaf_hash;
use crate::merkle::MerkleProof;
use crate::utils::parse_hash_hex;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const HASH_SIZE: usize = 32;

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; HASH_SIZE];

/// Root of an empty registry. Never a valid root to verify against.
pub const ZERO_HASH: Hash = [0u8; HASH_SIZE];

/// Whole days since 1970-01-01 UTC. Scopes device registration and expiry.
pub type DayEpoch = u32;

/// Nullifier scope chosen by the surrounding system, typically a round number.
///
/// Encoded as 4 big-endian bytes when hashed.
pub type EpochId = u32;

/// A device's public identifier, compared and ordered by its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(Vec<u8>);

impl DeviceId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        DeviceId(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `SHA256("leaf:" || id)`.
    #[must_use]
    pub fn leaf_hash(&self) -> Hash {
        leaf_hash(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        DeviceId(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for DeviceId {
    fn from(value: Vec<u8>) -> Self {
        DeviceId(value)
    }
}

impl fmt::Display for DeviceId {
    /// Printable ASCII identifiers are shown as text, anything else as hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) if !text.is_empty() && text.chars().all(|c| c.is_ascii_graphic()) => {
                f.write_str(text)
            }
            _ => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded)
            .map(DeviceId)
            .map_err(serde::de::Error::custom)
    }
}

/// An approved device.
///
/// Immutable once registered. Expiry is evaluated at query time and never
/// written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: DeviceId,
    pub registration_epoch: DayEpoch,
    pub expiry_epoch: DayEpoch,
    /// Opaque to the registry.
    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<u8>>,
}

impl DeviceIdentity {
    /// True while `today` has not passed the expiry day.
    #[must_use]
    pub fn is_active_on(&self, today: DayEpoch) -> bool {
        today <= self.expiry_epoch
    }

    #[must_use]
    pub fn leaf_hash(&self) -> Hash {
        self.device_id.leaf_hash()
    }
}

mod hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// JSON export of a membership proof, handed from the registry to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProofFile {
    pub leaf: String,
    pub merkle_root: String,
    pub merkle_siblings: Vec<String>,
    pub leaf_index: usize,
}

impl MembershipProofFile {
    #[must_use]
    pub fn from_proof(proof: &MerkleProof) -> Self {
        MembershipProofFile {
            leaf: hex::encode(proof.leaf),
            merkle_root: hex::encode(proof.root),
            merkle_siblings: proof.siblings.iter().map(hex::encode).collect(),
            leaf_index: proof.leaf_index,
        }
    }

    /// Decodes the hex fields back into a [`MerkleProof`].
    ///
    /// # Errors
    /// Returns an error naming the first field that is not 32 bytes of hex.
    pub fn to_proof(&self) -> Result<MerkleProof> {
        let siblings = self
            .merkle_siblings
            .iter()
            .enumerate()
            .map(|(i, s)| parse_hash_hex(s).with_context(|| format!("Invalid merkle sibling {i}")))
            .collect::<Result<Vec<_>>>()?;

        Ok(MerkleProof {
            leaf: parse_hash_hex(&self.leaf).context("Invalid leaf")?,
            root: parse_hash_hex(&self.merkle_root).context("Invalid merkle root")?,
            siblings,
            leaf_index: self.leaf_index,
        })
    }
}

/// JSON form of a submission handed from a prover to a verifier.
///
/// All hashes are lowercase hex strings of 32 bytes (64 characters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionFile {
    /// Leaf hash of the proving device.
    pub leaf: String,
    /// Root the proof was generated against.
    pub merkle_root: String,
    /// Sibling path from the leaf level upward.
    pub merkle_siblings: Vec<String>,
    pub leaf_index: usize,
    pub nullifier: String,
    pub commitment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<u8>,
}

impl SubmissionFile {
    /// Packages a membership proof together with the per-contribution values.
    #[must_use]
    pub fn from_parts(
        proof: &MerkleProof,
        nullifier: &Hash,
        commitment: &Hash,
        quality_score: Option<u8>,
    ) -> Self {
        SubmissionFile {
            leaf: hex::encode(proof.leaf),
            merkle_root: hex::encode(proof.root),
            merkle_siblings: proof.siblings.iter().map(hex::encode).collect(),
            leaf_index: proof.leaf_index,
            nullifier: hex::encode(nullifier),
            commitment: hex::encode(commitment),
            quality_score,
        }
    }

    /// Checks that every field decodes to a 32-byte value.
    ///
    /// # Errors
    /// Returns an error naming the first malformed field.
    pub fn validate(&self) -> Result<()> {
        self.to_submission().map(|_| ())
    }

    /// Decodes the hex fields into a gateway [`Submission`].
    ///
    /// # Errors
    /// Returns an error if any hash is not valid 32-byte hex, if the sibling
    /// path is longer than an index can address, or if the quality score is
    /// above 100.
    pub fn to_submission(&self) -> Result<Submission> {
        debug!("Decoding submission with {} siblings", self.merkle_siblings.len());

        let leaf = parse_hash_hex(&self.leaf).context("Invalid leaf")?;
        let claimed_root = parse_hash_hex(&self.merkle_root).context("Invalid merkle root")?;
        let nullifier = parse_hash_hex(&self.nullifier).context("Invalid nullifier")?;
        let commitment = parse_hash_hex(&self.commitment).context("Invalid commitment")?;

        if self.merkle_siblings.len() >= usize::BITS as usize {
            return Err(anyhow::anyhow!(
                "Merkle path has {} siblings, more than any registry can produce",
                self.merkle_siblings.len()
            ));
        }

        let siblings = self
            .merkle_siblings
            .iter()
            .enumerate()
            .map(|(i, s)| parse_hash_hex(s).with_context(|| format!("Invalid merkle sibling {i}")))
            .collect::<Result<Vec<_>>>()?;

        if let Some(score) = self.quality_score {
            if score > 100 {
                return Err(anyhow::anyhow!(
                    "Quality score must be between 0 and 100, got {score}"
                ));
            }
        }

        Ok(Submission {
            leaf,
            siblings,
            leaf_index: self.leaf_index,
            claimed_root,
            nullifier,
            commitment,
            quality_score: self.quality_score,
        })
    }
}
