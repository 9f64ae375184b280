//! Remote services the session depends on
//!
//! Both traits sit on the network boundary. [`HttpApi`] implements them over
//! the platform REST API; tests and embedders can supply their own.

mod http;

use async_trait::async_trait;
use shared::{LoginRequest, RoleRecord, TokenPair, UserProfile};

use crate::ClientResult;

pub use http::HttpApi;

/// Authentication endpoints
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchange credentials for a token pair
    async fn login(&self, request: &LoginRequest) -> ClientResult<TokenPair>;

    /// Exchange a refresh token for a new token pair
    async fn refresh(&self, refresh_token: &str) -> ClientResult<TokenPair>;

    /// Tell the server the session is over
    async fn logout(&self, access_token: &str) -> ClientResult<()>;
}

/// Role and permission lookups, authenticated with the caller's access token
#[async_trait]
pub trait RoleService: Send + Sync {
    async fn role_by_id(&self, access_token: &str, role_id: &str) -> ClientResult<RoleRecord>;

    async fn list_roles(&self, access_token: &str) -> ClientResult<Vec<RoleRecord>>;

    /// Profile of the user owning `access_token`
    async fn current_user(&self, access_token: &str) -> ClientResult<UserProfile>;
}
