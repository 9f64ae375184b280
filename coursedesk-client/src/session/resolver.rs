//! Role and permission resolution
//!
//! Lookups are tried in a fixed order and the first one to produce a role
//! wins. Which fallbacks follow depends on why the direct lookup failed:
//!
//! ```text
//! ById ──ok──────────────────────────────▶ role
//!   │ Forbidden                     other error
//!   ▼                                     ▼
//! OwnProfile ──▶ Degraded               ByName
//! ```

use serde::Serialize;
use shared::RoleRecord;

use super::types::RoleResolution;
use crate::SessionError;
use crate::service::RoleService;

/// One way of obtaining the signed-in user's role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Role detail by id
    ById,
    /// Role embedded in the user's own profile
    OwnProfile,
    /// Permission-less stand-in
    Degraded,
    /// Scan the role list for a matching name, then fetch its detail
    ByName,
}

impl Strategy {
    /// Strategies to try, in order, after `ById` failed with `cause`
    pub fn fallbacks(cause: &SessionError) -> &'static [Strategy] {
        if cause.is_forbidden() {
            &[Strategy::OwnProfile, Strategy::Degraded]
        } else {
            &[Strategy::ByName]
        }
    }

    async fn attempt(
        self,
        roles: &dyn RoleService,
        access_token: &str,
        role_name: &str,
        role_id: Option<&str>,
    ) -> Result<RoleRecord, SessionError> {
        match self {
            Strategy::ById => {
                let role_id = role_id
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| SessionError::RoleNotFound(format!("{role_name} has no id")))?;
                Ok(roles.role_by_id(access_token, role_id).await?)
            }
            Strategy::OwnProfile => {
                let profile = roles.current_user(access_token).await?;
                let embedded = profile
                    .role
                    .ok_or_else(|| SessionError::RoleNotFound("profile has no role".into()))?;
                let permissions = embedded.permissions.ok_or_else(|| {
                    SessionError::RoleNotFound("profile role carries no permissions".into())
                })?;
                Ok(RoleRecord {
                    id: embedded
                        .id
                        .or_else(|| role_id.map(str::to_string))
                        .or(profile.role_id)
                        .unwrap_or_default(),
                    name: embedded.name.unwrap_or_else(|| role_name.to_string()),
                    description: embedded.description,
                    is_active: true,
                    permissions,
                })
            }
            Strategy::Degraded => Ok(RoleRecord::degraded(
                role_id.unwrap_or_default(),
                role_name,
            )),
            Strategy::ByName => {
                let all = roles.list_roles(access_token).await?;
                let found = all
                    .into_iter()
                    .find(|r| r.name == role_name)
                    .ok_or_else(|| SessionError::RoleNotFound(role_name.to_string()))?;
                Ok(roles.role_by_id(access_token, &found.id).await?)
            }
        }
    }
}

/// Runs the strategy chain against a role service
pub struct RoleResolver<'a> {
    roles: &'a dyn RoleService,
    access_token: &'a str,
}

impl<'a> RoleResolver<'a> {
    pub fn new(roles: &'a dyn RoleService, access_token: &'a str) -> Self {
        Self {
            roles,
            access_token,
        }
    }

    pub async fn resolve(
        &self,
        role_name: &str,
        role_id: Option<&str>,
    ) -> Result<RoleResolution, SessionError> {
        let cause = match self.run(Strategy::ById, role_name, role_id).await {
            Ok(role) => return Ok(RoleResolution::new(role, Strategy::ById)),
            Err(e) => e,
        };

        let mut last = cause.clone();
        for &strategy in Strategy::fallbacks(&cause) {
            match self.run(strategy, role_name, role_id).await {
                Ok(role) => {
                    if strategy == Strategy::Degraded {
                        tracing::warn!(
                            role = %role_name,
                            cause = %cause,
                            "Role detail unavailable; continuing without permissions"
                        );
                    } else {
                        tracing::info!(role = %role_name, strategy = ?strategy, "Role resolved via fallback");
                    }
                    return Ok(RoleResolution::new(role, strategy));
                }
                Err(e) => last = e,
            }
        }

        tracing::warn!(role = %role_name, error = %last, "Role resolution failed");
        Err(last)
    }

    async fn run(
        &self,
        strategy: Strategy,
        role_name: &str,
        role_id: Option<&str>,
    ) -> Result<RoleRecord, SessionError> {
        let result = strategy
            .attempt(self.roles, self.access_token, role_name, role_id)
            .await;
        if let Err(e) = &result {
            tracing::debug!(strategy = ?strategy, error = %e, "Role lookup failed");
        }
        result
    }
}
