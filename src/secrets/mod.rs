//! # Secret Values
//!
//! Redacting, zeroizing container for every sensitive string the crate handles.

pub mod types;

pub use types::SecretString;
