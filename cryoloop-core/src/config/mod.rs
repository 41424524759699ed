//! Configuration types
//!
//! Runtime parameters stored as postcard binary data.

pub mod runtime;

pub use runtime::*;
