//! Nullifier derivation, contribution commitments and the spent-nullifier set.
//!
//! Byte layouts (all integers big-endian):
//!
//! ```text
//! nullifier  = SHA256("nullifier:v1:"  || u32(epoch_id) || secret[32])
//! commitment = SHA256("commitment:v1:" || cid || key || u64(round_id))
//! ```
//!
//! `cid` and `key` are concatenated raw, with no length prefixes; only the
//! trailing 8-byte round id has a fixed width.
//!
//! The nullifier never covers contribution content, so one device can submit
//! several distinct contributions while still being tracked once per epoch.
//! What an epoch means is up to the caller.

use crate::error::{RegistryError, StoreError};
use crate::hash::{tagged_hash, COMMITMENT_TAG, NULLIFIER_TAG};
use crate::store::terminate_last_line;
use crate::types::{EpochId, Hash, HASH_SIZE};
use crate::utils::parse_hash_hex;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// A device's secret. Never handed to the registry and never logged.
pub type DeviceSecret = [u8; HASH_SIZE];

/// Derives the per-epoch nullifier for `secret`.
///
/// Deterministic for a fixed `(secret, epoch_id)`; different epochs give
/// unlinkable values.
#[must_use]
pub fn derive_nullifier(secret: &DeviceSecret, epoch_id: EpochId) -> Hash {
    tagged_hash(NULLIFIER_TAG, &[&epoch_id.to_be_bytes(), secret])
}

/// Binds a contribution's content pointer and key material to a round.
#[must_use]
pub fn compute_commitment(content_pointer: &[u8], key_material: &[u8], round_id: u64) -> Hash {
    tagged_hash(
        COMMITMENT_TAG,
        &[content_pointer, key_material, &round_id.to_be_bytes()],
    )
}

struct SpentState {
    spent: HashSet<Hash>,
    journal: Option<File>,
}

/// Set of nullifiers that have been accepted.
///
/// Entries are never removed. With a journal, every newly spent nullifier is
/// appended as one lowercase hex line before it becomes visible in memory.
pub struct NullifierSet {
    state: Mutex<SpentState>,
    journal_path: Option<PathBuf>,
}

impl NullifierSet {
    /// In-memory set with no journal.
    #[must_use]
    pub fn new() -> Self {
        NullifierSet {
            state: Mutex::new(SpentState {
                spent: HashSet::new(),
                journal: None,
            }),
            journal_path: None,
        }
    }

    /// Opens (or creates) a journal file and loads every nullifier in it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PersistenceFailure`] if the file cannot be
    /// opened or contains a line that is not a 32-byte hex value.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(StoreError::from)?;

        let mut spent = HashSet::new();
        for (i, line) in BufReader::new(&file).lines().enumerate() {
            let line = line.map_err(StoreError::from)?;
            if line.trim().is_empty() {
                continue;
            }
            let nullifier = parse_hash_hex(&line).map_err(|e| StoreError::Corrupt {
                line: i + 1,
                reason: e.to_string(),
            })?;
            spent.insert(nullifier);
        }

        terminate_last_line(&mut file)?;

        info!("Loaded {} spent nullifiers from {}", spent.len(), path.display());

        Ok(NullifierSet {
            state: Mutex::new(SpentState {
                spent,
                journal: Some(file),
            }),
            journal_path: Some(path.to_path_buf()),
        })
    }

    #[must_use]
    pub fn journal_path(&self) -> Option<&Path> {
        self.journal_path.as_deref()
    }

    #[must_use]
    pub fn is_spent(&self, nullifier: &Hash) -> bool {
        self.state.lock().spent.contains(nullifier)
    }

    /// Records `nullifier` as spent. Returns `false` if it already was.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PersistenceFailure`] if the journal write
    /// fails; the in-memory set is left unchanged.
    pub fn mark_spent(&self, nullifier: &Hash) -> Result<bool, RegistryError> {
        let mut state = self.state.lock();
        if state.spent.contains(nullifier) {
            return Ok(false);
        }
        Self::record(&mut state, nullifier)?;
        Ok(true)
    }

    /// Atomically checks that `nullifier` is unspent and marks it spent.
    ///
    /// Of any number of concurrent calls with the same nullifier exactly one
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DoubleClaim`] if the nullifier was already
    /// spent, or [`RegistryError::PersistenceFailure`] if the journal write fails.
    pub fn try_spend(&self, nullifier: &Hash) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        if state.spent.contains(nullifier) {
            return Err(RegistryError::DoubleClaim {
                nullifier: hex::encode(nullifier),
            });
        }
        Self::record(&mut state, nullifier)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().spent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(state: &mut SpentState, nullifier: &Hash) -> Result<(), RegistryError> {
        if let Some(journal) = state.journal.as_mut() {
            let mut line = hex::encode(nullifier);
            line.push('\n');
            journal
                .write_all(line.as_bytes())
                .and_then(|()| journal.flush())
                .map_err(StoreError::from)?;
        }
        state.spent.insert(*nullifier);
        debug!("Nullifier {} marked spent", hex::encode(nullifier));
        Ok(())
    }
}

impl Default for NullifierSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};
    use tempfile::TempDir;

    const SECRET: DeviceSecret = [0x2A; 32];

    #[test]
    fn test_nullifier_is_deterministic() {
        assert_eq!(derive_nullifier(&SECRET, 1), derive_nullifier(&SECRET, 1));
    }

    #[test]
    fn test_nullifier_differs_across_epochs() {
        assert_ne!(derive_nullifier(&SECRET, 1), derive_nullifier(&SECRET, 2));
        assert_ne!(derive_nullifier(&SECRET, 0), derive_nullifier(&SECRET, u32::MAX));
    }

    #[test]
    fn test_nullifier_differs_across_secrets() {
        assert_ne!(derive_nullifier(&SECRET, 1), derive_nullifier(&[0x2B; 32], 1));
    }

    #[test]
    fn test_nullifier_byte_layout() {
        let mut preimage = b"nullifier:v1:".to_vec();
        preimage.extend_from_slice(&[0x00, 0x00, 0x01, 0x02]);
        preimage.extend_from_slice(&SECRET);
        let expected: [u8; 32] = Sha256::digest(&preimage).into();

        assert_eq!(derive_nullifier(&SECRET, 0x0102), expected);
    }

    #[test]
    fn test_commitment_is_deterministic() {
        let a = compute_commitment(b"bafybeigdyr", &[0x11; 64], 7);
        let b = compute_commitment(b"bafybeigdyr", &[0x11; 64], 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_commitment_binds_every_field() {
        let base = compute_commitment(b"cid-1", b"key", 7);
        assert_ne!(base, compute_commitment(b"cid-2", b"key", 7));
        assert_ne!(base, compute_commitment(b"cid-1", b"kez", 7));
        assert_ne!(base, compute_commitment(b"cid-1", b"key", 8));
    }

    #[test]
    fn test_commitment_byte_layout() {
        let mut preimage = b"commitment:v1:".to_vec();
        preimage.extend_from_slice(b"bafy");
        preimage.extend_from_slice(b"key");
        preimage.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 7]);
        let expected: [u8; 32] = Sha256::digest(&preimage).into();

        assert_eq!(compute_commitment(b"bafy", b"key", 7), expected);
    }

    #[test]
    fn test_commitment_accepts_empty_fields() {
        let mut preimage = b"commitment:v1:".to_vec();
        preimage.extend_from_slice(b"bafy");
        preimage.extend_from_slice(&7u64.to_be_bytes());
        let expected: [u8; 32] = Sha256::digest(&preimage).into();

        assert_eq!(compute_commitment(b"bafy", b"", 7), expected);
    }

    #[test]
    fn test_mark_spent_is_idempotent() {
        let set = NullifierSet::new();
        let nullifier = derive_nullifier(&SECRET, 3);

        assert!(!set.is_spent(&nullifier));
        assert!(set.mark_spent(&nullifier).unwrap());
        assert!(set.is_spent(&nullifier));
        assert!(!set.mark_spent(&nullifier).unwrap());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_try_spend_rejects_second_use() {
        let set = NullifierSet::new();
        let nullifier = derive_nullifier(&SECRET, 4);

        set.try_spend(&nullifier).unwrap();
        let err = set.try_spend(&nullifier).unwrap_err();
        assert_eq!(err.kind(), "double_claim");
    }

    #[test]
    fn test_journal_survives_reopen() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nullifiers.txt");
        let first = derive_nullifier(&SECRET, 1);
        let second = derive_nullifier(&SECRET, 2);

        {
            let set = NullifierSet::open(&path).unwrap();
            set.try_spend(&first).unwrap();
            set.try_spend(&second).unwrap();
        }

        let reopened = NullifierSet::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.is_spent(&first));
        assert!(matches!(
            reopened.try_spend(&second),
            Err(RegistryError::DoubleClaim { .. })
        ));
    }

    #[test]
    fn test_journal_without_trailing_newline() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nullifiers.txt");
        let first = derive_nullifier(&SECRET, 1);
        std::fs::write(&path, hex::encode(first)).unwrap();

        let set = NullifierSet::open(&path).unwrap();
        let second = derive_nullifier(&SECRET, 2);
        set.try_spend(&second).unwrap();
        drop(set);

        let reopened = NullifierSet::open(&path).unwrap();
        assert!(reopened.is_spent(&first));
        assert!(reopened.is_spent(&second));
    }

    #[test]
    fn test_corrupt_journal_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nullifiers.txt");
        std::fs::write(&path, "not-a-nullifier\n").unwrap();

        let result = NullifierSet::open(&path);
        assert!(matches!(
            result,
            Err(RegistryError::PersistenceFailure(StoreError::Corrupt { line: 1, .. }))
        ));
    }
}
