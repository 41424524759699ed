//! Cryoloop Hardware Abstraction Layer
//!
//! This crate defines the hardware abstraction traits the controller
//! runtime is written against. Board crates implement them on top of their
//! removable flash medium; the in-memory implementation in [`ram`] backs
//! host simulation and tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Runtime core (cryoloop-core)           │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cryoloop-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  board SD/    │       │  RamStorage   │
//! │  flash driver │       │  (host/tests) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`storage::FileStorage`] - Small named files on removable storage

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod ram;
pub mod storage;

// Re-export key types at crate root for convenience
pub use ram::RamStorage;
pub use storage::{FileStorage, StorageError, MAX_FILE_NAME_LEN};
