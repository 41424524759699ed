//! Central error log
//!
//! Every failure in the runtime is recorded here rather than propagated
//! across component boundaries. The presentation layer polls the log; the
//! runtime inspects the highest severity to decide whether a controlled
//! restart is due.

use heapless::Deque;

/// Number of records kept before the oldest is dropped
pub const ERROR_LOG_CAPACITY: usize = 32;

/// How bad a recorded failure is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Severity {
    /// Noteworthy, no action taken
    Info,
    /// Operation was adjusted or skipped, execution continues
    Warning,
    /// Operation failed, execution continues
    Error,
    /// The current call path stops; reported back as `Err`
    Halt,
    /// Device-level failure; a controlled restart is required
    Fatal,
}

/// What failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCode {
    /// Generic accessor called with the wrong value type
    TypeMismatch,
    /// Operation not supported by the state kind
    NotSupported,
    /// Ranged value was clamped into its bounds
    RangeClamped,
    /// Value rejected outright (NaN, unknown option)
    InvalidValue,
    /// Persisted selection index no longer names an option
    SelectionIndexInvalid,
    /// Storage medium could not be mounted
    MountFailed,
    /// Bank file failed validation and was discarded
    CorruptBank,
    /// Reading a record failed
    ReadFailed,
    /// Writing a record failed
    WriteFailed,
    /// Fault marker could not be created or removed
    MarkerFailed,
    /// Registration attempted after the scheduler started
    RegistrySealed,
    /// Registration table is full
    RegistryFull,
    /// State registered against a component of a different type
    OwnerMismatch,
    /// Watchdog deadline passed without a stop
    WatchdogExpired,
    /// Configuration could not be loaded or stored
    Config,
    /// Raised by a component
    Component,
}

/// One entry in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorRecord {
    /// What failed
    pub code: ErrorCode,
    /// Short human-readable context
    pub message: &'static str,
    /// How bad it is
    pub severity: Severity,
    /// Runtime clock when recorded (ms)
    pub at_ms: u64,
}

/// Bounded, ordered log of failures
#[derive(Debug, Default)]
pub struct ErrorLog {
    records: Deque<ErrorRecord, ERROR_LOG_CAPACITY>,
    /// Records dropped because the log was full
    dropped: u32,
    /// Highest severity seen since the last [`ErrorLog::take_worst`]
    worst: Option<Severity>,
}

impl ErrorLog {
    /// Create an empty log
    pub const fn new() -> Self {
        Self {
            records: Deque::new(),
            dropped: 0,
            worst: None,
        }
    }

    /// Record a failure
    pub fn record(
        &mut self,
        code: ErrorCode,
        message: &'static str,
        severity: Severity,
        at_ms: u64,
    ) {
        match severity {
            Severity::Info => info!("{:?}: {}", code, message),
            Severity::Warning => warn!("{:?}: {}", code, message),
            _ => error!("{:?} ({:?}): {}", code, severity, message),
        }

        if self.records.is_full() {
            self.records.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        let _ = self.records.push_back(ErrorRecord {
            code,
            message,
            severity,
            at_ms,
        });

        self.worst = Some(match self.worst {
            Some(w) if w >= severity => w,
            _ => severity,
        });
    }

    /// Records in the order they were made, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter()
    }

    /// Most recent record
    pub fn last(&self) -> Option<&ErrorRecord> {
        self.records.back()
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the log holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records lost to overflow
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Count records with a given code
    pub fn count(&self, code: ErrorCode) -> usize {
        self.records.iter().filter(|r| r.code == code).count()
    }

    /// Highest severity recorded since the last call, then reset it
    pub fn take_worst(&mut self) -> Option<Severity> {
        self.worst.take()
    }

    /// Drop all records
    pub fn clear(&mut self) {
        self.records.clear();
        self.worst = None;
    }
}
