//! Staged fault markers
//!
//! Consecutive unrecoverable-fault reboots are counted by zero-byte marker
//! files. Stages nest: stage 2 is only written once stage 1 exists, and so
//! on. Escalation must stay allocation-free and never blocks beyond the
//! storage calls themselves, because it runs from the trap path.

use cryoloop_hal::{FileStorage, StorageError};

/// Marker file names, in escalation order
pub const STAGE_MARKERS: [&str; 3] = ["fault1", "fault2", "fault3"];

/// Marker written once stale history has been wiped
pub const PURGE_MARKER: &str = "purged";

/// Consecutive-fault stage as recorded on the medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultStage {
    /// No markers
    Clean,
    Stage1,
    Stage2,
    /// Highest stage; further faults keep it
    Stage3,
}

impl FaultStage {
    const fn from_count(count: usize) -> Self {
        match count {
            0 => FaultStage::Clean,
            1 => FaultStage::Stage1,
            2 => FaultStage::Stage2,
            _ => FaultStage::Stage3,
        }
    }

    /// Check if a previous boot ended in a fault
    pub fn is_fault(&self) -> bool {
        *self != FaultStage::Clean
    }

    /// Read the stage from the markers present
    ///
    /// Counts markers in order up to the first missing one, so a stray
    /// later marker without its predecessors is ignored.
    pub fn read<S: FileStorage + ?Sized>(storage: &mut S) -> Self {
        let present = STAGE_MARKERS
            .iter()
            .take_while(|marker| storage.exists(marker))
            .count();
        Self::from_count(present)
    }
}

/// Record one more consecutive fault
///
/// Mounts the medium and creates the first missing marker. With every
/// marker already present nothing is written and the stage stays at
/// [`FaultStage::Stage3`].
pub fn escalate<S: FileStorage + ?Sized>(storage: &mut S) -> Result<FaultStage, StorageError> {
    storage.mount()?;
    for (i, marker) in STAGE_MARKERS.iter().enumerate() {
        if !storage.exists(marker) {
            storage.create(marker)?;
            return Ok(FaultStage::from_count(i + 1));
        }
    }
    Ok(FaultStage::Stage3)
}

/// Remove every stage marker
pub fn clear<S: FileStorage + ?Sized>(storage: &mut S) -> Result<(), StorageError> {
    for marker in STAGE_MARKERS {
        storage.remove(marker)?;
    }
    Ok(())
}
