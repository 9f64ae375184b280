//! CourseDesk Client - session management for the CourseDesk platform
//!
//! Signs users in against the platform REST API, keeps their tokens fresh,
//! and resolves the role and permissions the rest of the application checks
//! before showing or allowing anything.
//!
//! [`SessionManager`] is the entry point; see the [`session`] module.

pub mod config;
pub mod error;
pub mod http;
pub mod service;
pub mod session;
pub mod store;
pub mod token;

pub use config::{ApiRoutes, SessionConfig};
pub use error::{ClientError, ClientResult, SessionError, SessionResult};
pub use http::NetworkHttpClient;
pub use service::{AuthService, HttpApi, RoleService};
pub use session::{
    Credentials, LoginOutcome, RoleResolution, RoleResolver, SessionManager, SessionSnapshot,
    SessionState, Strategy, ValidationOutcome,
};
pub use store::{FileStore, MemoryStore, PersistedSession, SessionStore, StoreError};
pub use token::{TokenClaims, TokenError, TokenStatus};

// Re-export shared types for convenience
pub use shared::{
    LoginRequest, PermissionRecord, ProfileRole, RoleRecord, TokenPair, UserProfile, UserRecord,
};
