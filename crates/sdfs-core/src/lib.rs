//! SDFS Core Library
//!
//! Data model and pure algorithms for the distributed file store: cluster
//! membership, the SdfsName/Version/ContentHash triple, the ring-id hash,
//! and the merge/diff set algebra used to reconcile replicas. Configuration
//! and error types for the whole node live here too.

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::SdfsConfig;
pub use error::{Error, Result};

/// Crate version, for diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
