//! The canonical set of approved devices and its published Merkle root.
//!
//! Devices are kept in identifier byte order, so the same device set always
//! yields the same root and the same leaf index for each device no matter
//! the order in which they registered. All devices share one tree: its leaf
//! count is the anonymity set of every membership proof.
//!
//! Mutations take the write lock around persist, insert and rebuild, so a
//! reader sees either the old device set with the old root or the new set with
//! the new root.

use crate::config::RegistryConfig;
use crate::epoch::{Clock, SystemClock};
use crate::error::RegistryError;
use crate::merkle::{MerkleProof, MerkleTree};
use crate::store::{DeviceStore, MemoryStore};
use crate::types::{DeviceId, DeviceIdentity, Hash};
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

struct RegistryState {
    devices: BTreeMap<DeviceId, DeviceIdentity>,
    tree: MerkleTree,
    version: u64,
}

impl RegistryState {
    fn empty() -> Self {
        RegistryState {
            devices: BTreeMap::new(),
            tree: MerkleTree::new(Vec::new()),
            version: 0,
        }
    }

    /// Replaces the device set and publishes the matching root.
    fn publish(&mut self, devices: BTreeMap<DeviceId, DeviceIdentity>) {
        let leaves = devices.values().map(DeviceIdentity::leaf_hash).collect();
        self.tree = MerkleTree::new(leaves);
        self.devices = devices;
        self.version += 1;
    }
}

/// Root and size of the registry at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub root: Hash,
    pub version: u64,
    pub device_count: usize,
}

/// Thread-safe device registry backed by a [`DeviceStore`].
pub struct DeviceRegistry {
    state: RwLock<RegistryState>,
    store: Arc<dyn DeviceStore>,
    clock: Arc<dyn Clock>,
    config: RegistryConfig,
}

impl DeviceRegistry {
    /// Empty registry. Does not read `store`; use [`DeviceRegistry::open`] to
    /// start from previously persisted devices.
    pub fn new(store: Arc<dyn DeviceStore>, clock: Arc<dyn Clock>, config: RegistryConfig) -> Self {
        DeviceRegistry {
            state: RwLock::new(RegistryState::empty()),
            store,
            clock,
            config,
        }
    }

    /// Registry loaded from everything in `store`.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be read or holds an invalid device set.
    pub fn open(
        store: Arc<dyn DeviceStore>,
        clock: Arc<dyn Clock>,
        config: RegistryConfig,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new(store, clock, config);
        registry.reload()?;
        Ok(registry)
    }

    /// Volatile registry on the system clock with default settings.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            RegistryConfig::default(),
        )
    }

    /// Registers a new device, valid from today for the configured period.
    ///
    /// The identity is written to the store before it becomes visible; if
    /// the write fails nothing changes.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::AlreadyRegistered`] if `device_id` exists.
    /// - [`RegistryError::InvalidInput`] if the identifier or metadata is out of bounds.
    /// - [`RegistryError::PersistenceFailure`] if the store rejects the write.
    pub fn register(
        &self,
        device_id: DeviceId,
        metadata: Option<Vec<u8>>,
    ) -> Result<DeviceIdentity, RegistryError> {
        let registration_epoch = self.clock.today();
        let expiry_epoch = registration_epoch
            .checked_add(self.config.validity_days)
            .ok_or_else(|| RegistryError::InvalidInput("expiry epoch overflows".into()))?;

        let identity = DeviceIdentity {
            device_id,
            registration_epoch,
            expiry_epoch,
            metadata,
        };
        self.check_identity(&identity)?;

        let mut state = self.state.write();
        if state.devices.contains_key(&identity.device_id) {
            return Err(RegistryError::AlreadyRegistered {
                device_id: identity.device_id.to_string(),
            });
        }

        self.store.append(&identity)?;

        let mut devices = std::mem::take(&mut state.devices);
        devices.insert(identity.device_id.clone(), identity.clone());
        state.publish(devices);

        info!(
            "Registered device {} (expires day {}); {} devices, root {}",
            identity.device_id,
            identity.expiry_epoch,
            state.devices.len(),
            hex::encode(state.tree.root)
        );
        Ok(identity)
    }

    /// Merges previously registered identities without writing them to the store.
    ///
    /// The batch is applied all at once with a single rebuild, or not at all.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::AlreadyRegistered`] if an identifier repeats within
    ///   the batch or is already present.
    /// - [`RegistryError::InvalidInput`] if any identity is malformed.
    pub fn bulk_load(&self, identities: Vec<DeviceIdentity>) -> Result<usize, RegistryError> {
        let mut state = self.state.write();
        let mut devices = state.devices.clone();
        let count = identities.len();
        self.merge_into(&mut devices, identities)?;
        state.publish(devices);

        info!(
            "Bulk-loaded {} devices; {} total, root {}",
            count,
            state.devices.len(),
            hex::encode(state.tree.root)
        );
        Ok(count)
    }

    /// Discards the in-memory set and reloads it from the store.
    ///
    /// Call this after the device set was changed outside the registry, such
    /// as a purge of expired devices, so the published root follows it.
    ///
    /// # Errors
    ///
    /// Fails without changing the registry if the store cannot be read or its
    /// contents are invalid.
    pub fn reload(&self) -> Result<usize, RegistryError> {
        let mut state = self.state.write();
        let identities = self.store.load_all()?;
        let mut devices = BTreeMap::new();
        self.merge_into(&mut devices, identities)?;
        state.publish(devices);

        info!(
            "Loaded {} devices from store, root {}",
            state.devices.len(),
            hex::encode(state.tree.root)
        );
        Ok(state.devices.len())
    }

    /// True iff the device exists and today is not past its expiry day.
    #[must_use]
    pub fn is_approved(&self, device_id: &DeviceId) -> bool {
        let today = self.clock.today();
        self.state
            .read()
            .devices
            .get(device_id)
            .is_some_and(|identity| identity.is_active_on(today))
    }

    #[must_use]
    pub fn get(&self, device_id: &DeviceId) -> Option<DeviceIdentity> {
        self.state.read().devices.get(device_id).cloned()
    }

    /// Membership proof for `device_id` against the current root.
    ///
    /// The proof goes stale as soon as the registry changes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] if the device is unknown.
    pub fn get_proof(&self, device_id: &DeviceId) -> Result<MerkleProof, RegistryError> {
        let state = self.state.read();
        if !state.devices.contains_key(device_id) {
            return Err(RegistryError::NotRegistered {
                device_id: device_id.to_string(),
            });
        }

        let leaf_index = state.devices.range(..device_id).count();
        let proof = state.tree.generate_proof(leaf_index)?;
        debug!(
            "Proof for device {} at index {} ({} siblings, version {})",
            device_id,
            leaf_index,
            proof.siblings.len(),
            state.version
        );
        Ok(proof)
    }

    /// The published root; all zeros while the registry is empty.
    #[must_use]
    pub fn root(&self) -> Hash {
        self.state.read().tree.root
    }

    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.with_snapshot(|snapshot| snapshot)
    }

    /// Runs `f` with the current snapshot while holding off registrations,
    /// so the root `f` sees stays published until it returns.
    ///
    /// `f` must not call back into this registry.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(RegistrySnapshot) -> R) -> R {
        let state = self.state.read();
        f(RegistrySnapshot {
            root: state.tree.root,
            version: state.version,
            device_count: state.devices.len(),
        })
    }

    /// All devices in identifier order.
    #[must_use]
    pub fn list_all(&self) -> Vec<DeviceIdentity> {
        self.state.read().devices.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn merge_into(
        &self,
        devices: &mut BTreeMap<DeviceId, DeviceIdentity>,
        identities: Vec<DeviceIdentity>,
    ) -> Result<(), RegistryError> {
        for identity in identities {
            self.check_identity(&identity)?;
            if devices.contains_key(&identity.device_id) {
                return Err(RegistryError::AlreadyRegistered {
                    device_id: identity.device_id.to_string(),
                });
            }
            devices.insert(identity.device_id.clone(), identity);
        }
        Ok(())
    }

    fn check_identity(&self, identity: &DeviceIdentity) -> Result<(), RegistryError> {
        let id_len = identity.device_id.len();
        if id_len == 0 || id_len > self.config.max_device_id_len {
            return Err(RegistryError::InvalidInput(format!(
                "device id must be 1 to {} bytes, got {}",
                self.config.max_device_id_len, id_len
            )));
        }
        if let Some(metadata) = &identity.metadata {
            if metadata.len() > self.config.max_metadata_len {
                return Err(RegistryError::InvalidInput(format!(
                    "metadata for {} exceeds {} bytes",
                    identity.device_id, self.config.max_metadata_len
                )));
            }
        }
        if identity.expiry_epoch <= identity.registration_epoch {
            return Err(RegistryError::InvalidInput(format!(
                "device {} expires on day {} which is not after its registration day {}",
                identity.device_id, identity.expiry_epoch, identity.registration_epoch
            )));
        }
        Ok(())
    }
}
