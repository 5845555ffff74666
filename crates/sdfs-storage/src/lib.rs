//! Versioned, content-addressed local storage for one SDFS node.

pub mod local;

pub use local::{Handle, LocalStore};
