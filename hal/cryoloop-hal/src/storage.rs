//! Removable storage abstractions
//!
//! Provides a trait for the small, flat file store the runtime keeps on
//! removable flash: append-only record banks, existence-only marker files
//! and the occasional whole-file blob (configuration).

/// Maximum file name length accepted by implementations
///
/// Record banks are named after a numeric identifier plus an optional
/// `_2` suffix, markers and configuration use short fixed names.
pub const MAX_FILE_NAME_LEN: usize = 12;

/// Errors from storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Medium not present or mount failed
    NotMounted,
    /// File does not exist
    NotFound,
    /// Read from the medium failed
    Read,
    /// Write to the medium failed
    Write,
    /// Requested range lies outside the file
    OutOfRange,
    /// Medium is full
    Full,
    /// File name too long or otherwise invalid
    InvalidName,
}

/// File storage trait
///
/// Blocking access to a flat namespace of small files. Every call may touch
/// the physical medium, so callers are expected to rate-limit writes.
/// Implementations should handle:
/// - Mounting the medium lazily or on [`FileStorage::mount`]
/// - Appends that either land completely or not at all where possible
pub trait FileStorage {
    /// Mount the medium
    ///
    /// Calling this on an already-mounted medium succeeds without effect.
    fn mount(&mut self) -> Result<(), StorageError>;

    /// Check if a file exists
    fn exists(&mut self, name: &str) -> bool;

    /// Size of a file in bytes
    fn size(&mut self, name: &str) -> Result<usize, StorageError>;

    /// Append bytes to a file, creating it if absent
    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Read bytes starting at `offset` into `buffer`
    ///
    /// # Returns
    /// The number of bytes read, which is short only at end of file.
    fn read_at(
        &mut self,
        name: &str,
        offset: usize,
        buffer: &mut [u8],
    ) -> Result<usize, StorageError>;

    /// Replace the contents of a file, creating it if absent
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Create an empty file if it does not exist yet
    fn create(&mut self, name: &str) -> Result<(), StorageError> {
        if self.exists(name) {
            return Ok(());
        }
        self.write(name, &[])
    }

    /// Remove a file
    ///
    /// Removing a file that does not exist succeeds.
    fn remove(&mut self, name: &str) -> Result<(), StorageError>;
}
