//! Data models
//!
//! Shared between the session client and its consumers.
//! Identifiers arrive as strings or numbers and are normalized to `String`.

pub mod role;
pub mod user;

// Re-exports
pub use role::*;
pub use user::*;
