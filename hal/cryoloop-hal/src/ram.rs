//! In-memory file storage
//!
//! Heap-backed [`FileStorage`] for host simulation and tests. Survives a
//! simulated reboot as long as the value itself is kept, which is how
//! tests model power cycles: drop the runtime, keep the storage.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::storage::{FileStorage, StorageError, MAX_FILE_NAME_LEN};

/// RAM-backed storage with fault injection
#[derive(Debug, Clone, Default)]
pub struct RamStorage {
    files: BTreeMap<String, Vec<u8>>,
    mounted: bool,
    /// Mount attempts fail (card missing)
    pub fail_mount: bool,
    /// Appends, writes and removals fail
    pub fail_writes: bool,
    /// Reads fail
    pub fail_reads: bool,
    /// Number of successful appends and writes
    writes: usize,
}

impl RamStorage {
    /// Create an empty, unmounted medium
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the mount state, as a reboot would
    pub fn unmount(&mut self) {
        self.mounted = false;
    }

    /// Number of files on the medium
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Raw contents of a file
    pub fn contents(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(|f| f.as_slice())
    }

    /// Put raw bytes in place, bypassing mount and fault checks
    pub fn insert_raw(&mut self, name: &str, data: &[u8]) {
        self.files.insert(String::from(name), data.to_vec());
    }

    /// Number of successful appends and writes so far
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn check(&self, name: &str) -> Result<(), StorageError> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
            return Err(StorageError::InvalidName);
        }
        Ok(())
    }
}

impl FileStorage for RamStorage {
    fn mount(&mut self) -> Result<(), StorageError> {
        if self.fail_mount {
            self.mounted = false;
            return Err(StorageError::NotMounted);
        }
        self.mounted = true;
        Ok(())
    }

    fn exists(&mut self, name: &str) -> bool {
        self.mounted && self.files.contains_key(name)
    }

    fn size(&mut self, name: &str) -> Result<usize, StorageError> {
        self.check(name)?;
        self.files
            .get(name)
            .map(|f| f.len())
            .ok_or(StorageError::NotFound)
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        self.check(name)?;
        if self.fail_writes {
            return Err(StorageError::Write);
        }
        self.files
            .entry(String::from(name))
            .or_default()
            .extend_from_slice(data);
        self.writes += 1;
        Ok(())
    }

    fn read_at(
        &mut self,
        name: &str,
        offset: usize,
        buffer: &mut [u8],
    ) -> Result<usize, StorageError> {
        self.check(name)?;
        if self.fail_reads {
            return Err(StorageError::Read);
        }
        let file = self.files.get(name).ok_or(StorageError::NotFound)?;
        if offset > file.len() {
            return Err(StorageError::OutOfRange);
        }
        let len = buffer.len().min(file.len() - offset);
        buffer[..len].copy_from_slice(&file[offset..offset + len]);
        Ok(len)
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        self.check(name)?;
        if self.fail_writes {
            return Err(StorageError::Write);
        }
        self.files.insert(String::from(name), data.to_vec());
        self.writes += 1;
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        self.check(name)?;
        if self.fail_writes {
            return Err(StorageError::Write);
        }
        self.files.remove(name);
        Ok(())
    }
}
