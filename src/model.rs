//! Roles, route permissions and user records

use serde::{Deserialize, Serialize};

use crate::error::{RbacError, Result};

/// A named permission group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    pub role_id: String,
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub is_system: bool,
}

/// Which roles may view a route. `route` is an exact path or a `/*` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePermission {
    pub id: String,
    pub route: String,
    pub label: String,
    pub allowed_roles: Vec<String>,
    pub is_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RoutePermission {
    pub fn allows_role(&self, role: &str) -> bool {
        self.allowed_roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    pub role_id: String,
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoute {
    pub route: String,
    pub label: String,
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial route update; `None` keeps the prior value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RoutePatch {
    pub fn enabled(is_enabled: bool) -> Self {
        Self { is_enabled: Some(is_enabled), ..Self::default() }
    }

    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { allowed_roles: Some(roles.into_iter().map(Into::into).collect()), ..Self::default() }
    }

    /// Merge into `target`, leaving unspecified fields untouched.
    pub fn apply(self, target: &mut RoutePermission) {
        if let Some(label) = self.label {
            target.label = label;
        }
        if let Some(roles) = self.allowed_roles {
            target.allowed_roles = roles;
        }
        if let Some(enabled) = self.is_enabled {
            target.is_enabled = enabled;
        }
        if let Some(description) = self.description {
            target.description = Some(description);
        }
    }
}

/// A user known to the permission authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub role: String,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
}

/// Role plus the routes that role may navigate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibleRoutes {
    pub role: String,
    pub routes: Vec<RoutePermission>,
}

/// Externally verified principal handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub display_name: String,
    pub email: String,
}

/// Trim and upper-case a role id, rejecting empty or odd characters.
pub fn normalize_role_id(raw: &str) -> Result<String> {
    let id = raw.trim().to_ascii_uppercase();
    if id.is_empty() {
        return Err(RbacError::Invalid("Role id cannot be empty".into()));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(RbacError::Invalid(format!("Invalid role id '{}'", raw.trim())));
    }
    Ok(id)
}
