//! Role Model

use serde::{Deserialize, Serialize};

use crate::serde_util::{lenient_list, opt_string_or_number, string_or_number};

/// Capability descriptor attached to a role.
///
/// Opaque to the session layer; consumers match on `name` or on the
/// `method` + `path` pair when authorizing an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

impl PermissionRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            method: None,
            path: None,
        }
    }

    /// Attach the HTTP route this permission guards
    pub fn with_route(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.path = Some(path.into());
        self
    }
}

/// Role entity (RBAC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active", alias = "isActive")]
    pub is_active: bool,
    /// Absent or non-list payloads deserialize as an empty list
    #[serde(default, deserialize_with = "lenient_list")]
    pub permissions: Vec<PermissionRecord>,
}

fn default_active() -> bool {
    true
}

impl RoleRecord {
    /// Minimal stand-in used when the role detail cannot be read.
    ///
    /// Carries no permissions: the holder is signed in but can do nothing
    /// until an administrator grants access.
    pub fn degraded(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            is_active: true,
            permissions: Vec::new(),
        }
    }
}

/// Role list payload.
///
/// Older API builds return a bare array, newer ones wrap it as `{ "roles": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RoleList {
    Bare(Vec<RoleRecord>),
    Wrapped { roles: Vec<RoleRecord> },
}

impl RoleList {
    pub fn into_roles(self) -> Vec<RoleRecord> {
        match self {
            Self::Bare(roles) | Self::Wrapped { roles } => roles,
        }
    }
}

/// Role as embedded in the current user's profile.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRole {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `None` when the profile carries no usable permission list
    #[serde(default, deserialize_with = "crate::serde_util::lenient_opt_list")]
    pub permissions: Option<Vec<PermissionRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions_coerced() {
        let role: RoleRecord =
            serde_json::from_str(r#"{"id": 3, "name": "auditor", "permissions": null}"#).unwrap();
        assert_eq!(role.id, "3");
        assert!(role.is_active);
        assert!(role.permissions.is_empty());

        let role: RoleRecord = serde_json::from_str(
            r#"{"id": "3", "name": "auditor", "isActive": false, "permissions": "all"}"#,
        )
        .unwrap();
        assert!(!role.is_active);
        assert!(role.permissions.is_empty());
    }

    #[test]
    fn test_role_list_shapes() {
        let bare: RoleList =
            serde_json::from_str(r#"[{"id": 1, "name": "admin"}, {"id": 2, "name": "trainer"}]"#)
                .unwrap();
        assert_eq!(bare.into_roles().len(), 2);

        let wrapped: RoleList =
            serde_json::from_str(r#"{"roles": [{"id": 1, "name": "admin"}]}"#).unwrap();
        let roles = wrapped.into_roles();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, "admin");
    }

    #[test]
    fn test_permission_route() {
        let p: PermissionRecord = serde_json::from_str(
            r#"{"id": 9, "name": "courses:write", "method": "POST", "path": "/courses"}"#,
        )
        .unwrap();
        assert_eq!(p, PermissionRecord::new("9", "courses:write").with_route("POST", "/courses"));
    }
}
