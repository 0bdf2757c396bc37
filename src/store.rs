//! Durable storage for registered devices.
//!
//! The registry reloads its full device set from a [`DeviceStore`] at start
//! and appends each new registration before publishing it.

use crate::error::StoreError;
use crate::types::DeviceIdentity;
use log::debug;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Row store for device identities.
pub trait DeviceStore: Send + Sync {
    /// Every identity previously appended, in append order.
    fn load_all(&self) -> Result<Vec<DeviceIdentity>, StoreError>;

    /// Durably records one new identity.
    fn append(&self, identity: &DeviceIdentity) -> Result<(), StoreError>;
}

/// Volatile store. Can be switched into a failing mode to exercise
/// persistence errors.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<DeviceIdentity>>,
    failing: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `rows`.
    #[must_use]
    pub fn with_rows(rows: Vec<DeviceIdentity>) -> Self {
        MemoryStore {
            rows: Mutex::new(rows),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Removes rows that do not satisfy `keep`. Stands in for an external purge.
    pub fn retain(&self, keep: impl FnMut(&DeviceIdentity) -> bool) {
        self.rows.lock().retain(keep);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        Ok(())
    }
}

impl DeviceStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<DeviceIdentity>, StoreError> {
        self.check_available()?;
        Ok(self.rows.lock().clone())
    }

    fn append(&self, identity: &DeviceIdentity) -> Result<(), StoreError> {
        self.check_available()?;
        self.rows.lock().push(identity.clone());
        Ok(())
    }
}

/// Append-only file with one JSON-encoded [`DeviceIdentity`] per line.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesStore {
    /// Uses `path`, creating parent directories on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonLinesStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceStore for JsonLinesStore {
    fn load_all(&self) -> Result<Vec<DeviceIdentity>, StoreError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut identities = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let identity = serde_json::from_str(&line).map_err(|e| StoreError::Corrupt {
                line: i + 1,
                reason: e.to_string(),
            })?;
            identities.push(identity);
        }

        debug!(
            "Loaded {} device records from {}",
            identities.len(),
            self.path.display()
        );
        Ok(identities)
    }

    fn append(&self, identity: &DeviceIdentity) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(identity).map_err(|e| StoreError::Corrupt {
            line: 0,
            reason: e.to_string(),
        })?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)?;
        terminate_last_line(&mut file)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Appends a newline if the file is non-empty and does not already end with one.
///
/// `file` must be opened for reading and appending.
pub(crate) fn terminate_last_line(file: &mut File) -> Result<(), StoreError> {
    let len = file.seek(SeekFrom::End(0))?;
    if len == 0 {
        return Ok(());
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        file.write_all(b"\n")?;
    }
    Ok(())
}
