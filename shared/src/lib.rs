//! Shared types for the coursedesk client
//!
//! Wire DTOs of the authentication API, user and role models, and the
//! lenient serde helpers that normalize backend payloads.

pub mod client;
pub mod models;
pub mod serde_util;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use client::{LoginRequest, RefreshRequest, TokenPair};
pub use models::{PermissionRecord, ProfileRole, RoleList, RoleRecord, UserProfile, UserRecord};
