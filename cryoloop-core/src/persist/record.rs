//! Dual-bank persistent record
//!
//! A record is an append-only log of one fixed-size value spread over two
//! bank files, `<id>` (bank A) and `<id>_2` (bank B). Writes append to the
//! current bank. When it reaches `max_entries` records it becomes the older
//! bank and writes move to the other one; if that other bank still holds
//! the previous generation it is deleted first. On-disk history is thereby
//! bounded to `2 × max_entries` records while at least `max_entries`
//! records of history survive every rotation.
//!
//! After a rotation the fresh bank starts empty, so at boot the smaller of
//! two banks is the newer one.

use core::fmt::Write as _;
use core::ops::Add;

use cryoloop_hal::{FileStorage, StorageError, MAX_FILE_NAME_LEN};
use heapless::String;

use super::codec::{Record, MAX_RECORD_SIZE};

/// Bank file name
pub type FileName = String<MAX_FILE_NAME_LEN>;

/// Suffix of the alternate bank file
pub const BANK_B_SUFFIX: &str = "_2";

/// One of the two bank files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bank {
    A,
    B,
}

impl Bank {
    /// The other bank
    pub const fn other(self) -> Self {
        match self {
            Bank::A => Bank::B,
            Bank::B => Bank::A,
        }
    }

    const fn index(self) -> usize {
        match self {
            Bank::A => 0,
            Bank::B => 1,
        }
    }
}

/// Conditions a write is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriteGate {
    /// Boot-time initialization of every store has completed
    pub init_complete: bool,
    /// Supply is failing; the medium must not be touched
    pub power_failing: bool,
    /// Current runtime clock (ms)
    pub now_ms: u64,
}

impl WriteGate {
    /// Gate for normal operation at `now_ms`
    pub const fn open(now_ms: u64) -> Self {
        Self {
            init_complete: true,
            power_failing: false,
            now_ms,
        }
    }
}

/// Result of a write attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteOutcome {
    /// Record appended
    Written,
    /// Value equals the last written record
    Unchanged,
    /// Minimum interval since the last write has not elapsed
    Debounced,
    /// Initialization has not completed
    NotReady,
    /// Power-loss flag is set
    PowerFailing,
    /// Medium reported an error
    Failed(StorageError),
}

/// Result of boot-time initialization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InitReport {
    /// Bank files discarded as corrupt
    pub corrupt_banks: u8,
    /// No history survived; the default value was written
    pub seeded: bool,
}

/// Append-only record of a fixed-size value over two bank files
#[derive(Debug, Clone)]
pub struct PersistentRecord<T: Record> {
    /// Bank file names, indexed by [`Bank`]
    names: [FileName; 2],
    /// Latest in-memory value (may not be written yet)
    value: T,
    /// Last value appended to a bank
    last_written: Option<T>,
    /// Records per bank before rotating
    max_entries: usize,
    /// Minimum spacing between writes (ms)
    min_interval_ms: u64,
    /// Time of the last append (ms)
    last_write_ms: Option<u64>,
    /// Bank receiving writes
    current: Bank,
    /// Records in the current bank
    current_len: usize,
    /// Records in the older bank (0 if it does not exist)
    older_len: usize,
    /// Last storage error seen
    error: Option<StorageError>,
}

impl<T: Record> PersistentRecord<T> {
    /// Create a record named after a durable identifier
    ///
    /// # Arguments
    /// - `id`: Durable identifier; bank files are `<id>` and `<id>_2`
    /// - `default`: Value used until storage says otherwise
    /// - `max_entries`: Records per bank before rotation (at least 1)
    /// - `min_interval_ms`: Minimum spacing between writes
    pub fn new(id: u16, default: T, max_entries: u16, min_interval_ms: u32) -> Self {
        let mut a = FileName::new();
        let mut b = FileName::new();
        // u16 plus suffix always fits the name limit
        let _ = write!(a, "{}", id);
        let _ = write!(b, "{}{}", id, BANK_B_SUFFIX);

        Self {
            names: [a, b],
            value: default,
            last_written: None,
            max_entries: usize::from(max_entries.max(1)),
            min_interval_ms: u64::from(min_interval_ms),
            last_write_ms: None,
            current: Bank::A,
            current_len: 0,
            older_len: 0,
            error: None,
        }
    }

    /// File name of a bank
    pub fn file_name(&self, bank: Bank) -> &str {
        &self.names[bank.index()]
    }

    /// Latest in-memory value
    pub fn value(&self) -> T {
        self.value
    }

    /// Bank currently receiving writes
    pub fn current_bank(&self) -> Bank {
        self.current
    }

    /// Both banks hold history; writes go to the second one
    pub fn second_bank_active(&self) -> bool {
        self.older_len > 0
    }

    /// Records across both banks
    pub fn entries(&self) -> usize {
        self.older_len + self.current_len
    }

    /// Byte size of the current bank
    pub fn file_size(&self) -> usize {
        self.current_len * T::SIZE
    }

    /// Records per bank before rotation
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Last storage error seen, if any
    pub fn error(&self) -> Option<StorageError> {
        self.error
    }

    /// Clear the error flag
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Flag a storage failure hit on behalf of this record
    pub fn set_error(&mut self, error: StorageError) {
        self.error = Some(error);
    }

    /// Validate and adopt the bank files found on the medium
    ///
    /// Banks whose size is not a whole number of records are deleted as
    /// corrupt. If no history survives, the current in-memory value is
    /// written once so the store is never empty.
    pub fn init<S: FileStorage + ?Sized>(&mut self, storage: &mut S) -> InitReport {
        let mut report = InitReport::default();

        let a_len = self.validate_bank(storage, Bank::A, &mut report);
        let b_len = self.validate_bank(storage, Bank::B, &mut report);

        self.last_write_ms = None;
        self.last_written = None;

        match (a_len, b_len) {
            (0, 0) => {
                debug!("Record {}: no history, seeding", self.file_name(Bank::A));
                self.current = Bank::A;
                self.current_len = 0;
                self.older_len = 0;
                report.seeded = true;
                let value = self.value;
                self.append(storage, value);
                return report;
            }
            (len, 0) | (0, len) => {
                let bank = if a_len > 0 { Bank::A } else { Bank::B };
                if len >= self.max_entries {
                    // Full bank is history; writes continue in the other
                    self.current = bank.other();
                    self.current_len = 0;
                    self.older_len = len;
                } else {
                    self.current = bank;
                    self.current_len = len;
                    self.older_len = 0;
                }
            }
            (a, b) => {
                // Smaller bank is newer; on a tie B was written last
                if a < b {
                    self.current = Bank::A;
                    self.current_len = a;
                    self.older_len = b;
                } else {
                    self.current = Bank::B;
                    self.current_len = b;
                    self.older_len = a;
                }
                if self.current_len >= self.max_entries {
                    // Power was lost between filling a bank and rotating
                    self.rotate(storage);
                }
            }
        }

        self.value = self.read(storage);
        self.last_written = Some(self.value);
        report
    }

    /// Size-check one bank, deleting it if it is corrupt
    ///
    /// Returns the number of records it holds.
    fn validate_bank<S: FileStorage + ?Sized>(
        &mut self,
        storage: &mut S,
        bank: Bank,
        report: &mut InitReport,
    ) -> usize {
        let name = &self.names[bank.index()];
        if !storage.exists(name) {
            return 0;
        }
        match storage.size(name) {
            Ok(size) if size % T::SIZE == 0 => size / T::SIZE,
            Ok(size) => {
                warn!("Bank {} corrupt ({} bytes), discarding", name.as_str(), size);
                report.corrupt_banks += 1;
                if let Err(e) = storage.remove(name) {
                    self.error = Some(e);
                }
                0
            }
            Err(e) => {
                self.error = Some(e);
                0
            }
        }
    }

    /// Write a value, subject to the gate and the debounce interval
    ///
    /// The in-memory value is updated even when the write is held back, so
    /// a later write or [`PersistentRecord::flush`] persists it.
    pub fn write<S: FileStorage + ?Sized>(
        &mut self,
        storage: &mut S,
        gate: WriteGate,
        value: T,
    ) -> WriteOutcome {
        self.value = value;

        if !gate.init_complete {
            return WriteOutcome::NotReady;
        }
        if gate.power_failing {
            return WriteOutcome::PowerFailing;
        }
        if self.last_written == Some(value) {
            return WriteOutcome::Unchanged;
        }
        if let Some(last) = self.last_write_ms {
            if gate.now_ms.saturating_sub(last) < self.min_interval_ms {
                return WriteOutcome::Debounced;
            }
        }

        let outcome = self.append(storage, value);
        if outcome == WriteOutcome::Written {
            self.last_write_ms = Some(gate.now_ms);
        }
        outcome
    }

    /// Persist the in-memory value if it has not been written yet
    pub fn flush<S: FileStorage + ?Sized>(&mut self, storage: &mut S, gate: WriteGate) -> WriteOutcome {
        let value = self.value;
        self.write(storage, gate, value)
    }

    /// Append unconditionally, rotating banks when the current one fills
    fn append<S: FileStorage + ?Sized>(&mut self, storage: &mut S, value: T) -> WriteOutcome {
        let mut buf = [0u8; MAX_RECORD_SIZE];
        let bytes = &mut buf[..T::SIZE];
        value.encode(bytes);

        if let Err(e) = storage.append(&self.names[self.current.index()], bytes) {
            warn!("Record {}: append failed: {:?}", self.file_name(self.current), e);
            self.error = Some(e);
            return WriteOutcome::Failed(e);
        }

        self.current_len += 1;
        self.last_written = Some(value);

        if self.current_len >= self.max_entries {
            self.rotate(storage);
        }
        WriteOutcome::Written
    }

    /// Retire the full current bank and start the other one empty
    fn rotate<S: FileStorage + ?Sized>(&mut self, storage: &mut S) {
        let next = self.current.other();
        if self.older_len > 0 {
            if let Err(e) = storage.remove(&self.names[next.index()]) {
                // Leave roles alone; rotation is retried on the next append
                warn!("Record {}: rotation failed: {:?}", self.file_name(next), e);
                self.error = Some(e);
                return;
            }
        }
        debug!(
            "Record {}: rotating to bank {:?}",
            self.file_name(Bank::A),
            next
        );
        self.older_len = self.current_len;
        self.current = next;
        self.current_len = 0;
    }

    /// Most recently written record
    ///
    /// Falls back to the in-memory value when no record exists or the read
    /// fails; a failure also sets the error flag.
    pub fn read<S: FileStorage + ?Sized>(&mut self, storage: &mut S) -> T {
        let (bank, len) = if self.current_len > 0 {
            (self.current, self.current_len)
        } else {
            (self.current.other(), self.older_len)
        };
        if len == 0 {
            return self.value;
        }
        match self.read_slot(storage, bank, len - 1) {
            Ok(value) => value,
            Err(e) => {
                self.error = Some(e);
                self.value
            }
        }
    }

    /// Record at a logical position in the history, oldest first
    ///
    /// Index 0 is the oldest surviving record, `entries() - 1` the newest.
    pub fn get_element<S: FileStorage + ?Sized>(
        &mut self,
        storage: &mut S,
        index: usize,
    ) -> Option<T> {
        let (bank, slot) = if index < self.older_len {
            (self.current.other(), index)
        } else if index < self.entries() {
            (self.current, index - self.older_len)
        } else {
            return None;
        };

        match self.read_slot(storage, bank, slot) {
            Ok(value) => Some(value),
            Err(e) => {
                self.error = Some(e);
                None
            }
        }
    }

    fn read_slot<S: FileStorage + ?Sized>(
        &self,
        storage: &mut S,
        bank: Bank,
        slot: usize,
    ) -> Result<T, StorageError> {
        let mut buf = [0u8; MAX_RECORD_SIZE];
        let bytes = &mut buf[..T::SIZE];
        let len = storage.read_at(&self.names[bank.index()], slot * T::SIZE, bytes)?;
        if len != T::SIZE {
            return Err(StorageError::Read);
        }
        Ok(T::decode(bytes))
    }

    /// Remove both bank files and forget all history
    pub fn erase<S: FileStorage + ?Sized>(&mut self, storage: &mut S) -> Result<(), StorageError> {
        storage.remove(&self.names[0])?;
        storage.remove(&self.names[1])?;
        self.current = Bank::A;
        self.current_len = 0;
        self.older_len = 0;
        self.last_written = None;
        self.last_write_ms = None;
        Ok(())
    }
}

impl<T: Record + Add<Output = T>> PersistentRecord<T> {
    /// Add `delta` to the in-memory value and write the sum
    ///
    /// Deltas accumulate in memory while writes are debounced.
    pub fn accumulate<S: FileStorage + ?Sized>(
        &mut self,
        storage: &mut S,
        gate: WriteGate,
        delta: T,
    ) -> WriteOutcome {
        let next = self.value + delta;
        self.write(storage, gate, next)
    }
}
