//! Session state and the read-only views handed to the application

use serde::Serialize;
use shared::{LoginRequest, PermissionRecord, RoleRecord, UserRecord};

use super::resolver::Strategy;
use crate::SessionError;

/// Login credentials
pub type Credentials = LoginRequest;

/// Lifecycle of the session manager.
///
/// `Uninitialized -> Loading -> {Authenticated, Unauthenticated}`; an
/// authenticated session drops back to `Unauthenticated` on logout or when
/// its token can no longer be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Loading,
    Authenticated,
    Unauthenticated,
}

/// The live session. Owned by the manager, never handed out directly.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserRecord,
    pub role: Option<RoleRecord>,
    pub permissions: Vec<PermissionRecord>,
}

/// Role plus the permission list derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct RoleResolution {
    pub role: RoleRecord,
    pub permissions: Vec<PermissionRecord>,
    /// Which lookup produced the role
    pub strategy: Strategy,
}

impl RoleResolution {
    pub(crate) fn new(role: RoleRecord, strategy: Strategy) -> Self {
        let permissions = role.permissions.clone();
        Self {
            role,
            permissions,
            strategy,
        }
    }
}

/// Point-in-time view of the session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub user: Option<UserRecord>,
    pub role: Option<RoleRecord>,
    pub permissions: Vec<PermissionRecord>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl SessionSnapshot {
    pub(crate) fn build(state: SessionState, session: Option<&Session>) -> Self {
        let authenticated = state == SessionState::Authenticated;
        let session = session.filter(|_| authenticated);
        Self {
            state,
            user: session.map(|s| s.user.clone()),
            role: session.and_then(|s| s.role.clone()),
            permissions: session.map(|s| s.permissions.clone()).unwrap_or_default(),
            is_authenticated: authenticated,
            is_loading: state == SessionState::Loading,
        }
    }

    /// Check a named permission.
    ///
    /// `all` and `*` grant everything; `courses:*` matches `courses:write`.
    pub fn has_permission(&self, name: &str) -> bool {
        self.is_authenticated
            && self.permissions.iter().any(|p| {
                if p.name == name || p.name == "all" || p.name == "*" {
                    return true;
                }
                p.name
                    .strip_suffix(":*")
                    .is_some_and(|prefix| name.starts_with(&format!("{prefix}:")))
            })
    }

    /// Check a route permission. A stored path ending in `/*` covers its subtree.
    pub fn can(&self, method: &str, path: &str) -> bool {
        self.is_authenticated
            && self.permissions.iter().any(|p| {
                if p.name == "all" || p.name == "*" {
                    return true;
                }
                let (Some(p_method), Some(p_path)) = (p.method.as_deref(), p.path.as_deref())
                else {
                    return false;
                };
                if !(p_method == "*" || p_method.eq_ignore_ascii_case(method)) {
                    return false;
                }
                match p_path.strip_suffix("/*") {
                    Some(prefix) => path == prefix || path.starts_with(&format!("{prefix}/")),
                    None => p_path == path,
                }
            })
    }
}

/// Result of [`SessionManager::login`](super::SessionManager::login).
///
/// Login reports failure in-band rather than through `Err`, so callers branch
/// on `success`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub success: bool,
    pub user: Option<UserRecord>,
    pub role: Option<RoleRecord>,
    pub permissions: Vec<PermissionRecord>,
    pub error: Option<SessionError>,
}

impl LoginOutcome {
    pub(crate) fn succeeded(session: &Session) -> Self {
        Self {
            success: true,
            user: Some(session.user.clone()),
            role: session.role.clone(),
            permissions: session.permissions.clone(),
            error: None,
        }
    }

    pub(crate) fn failed(error: SessionError) -> Self {
        Self {
            success: false,
            user: None,
            role: None,
            permissions: Vec::new(),
            error: Some(error),
        }
    }

    /// Convert to a `Result` for `?`-style callers
    pub fn into_result(self) -> Result<(UserRecord, Vec<PermissionRecord>), SessionError> {
        match (self.success, self.user, self.error) {
            (true, Some(user), _) => Ok((user, self.permissions)),
            (_, _, Some(error)) => Err(error),
            _ => Err(SessionError::InvalidToken("login produced no user".into())),
        }
    }
}
