//! User Model

use serde::{Deserialize, Serialize};

use super::role::ProfileRole;
use crate::serde_util::{opt_string_or_number, string_or_number};

/// Signed-in user as cached by the client.
///
/// Persisted verbatim (JSON) under the `user` key of the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
    /// Role name
    pub role: String,
    #[serde(default, alias = "roleId")]
    pub role_id: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    /// Unix milliseconds of the last successful login
    #[serde(default, alias = "lastLogin")]
    pub last_login: Option<i64>,
}

/// Current-user profile as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
    #[serde(default, alias = "roleId", deserialize_with = "opt_string_or_number")]
    pub role_id: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub role: Option<ProfileRole>,
}
