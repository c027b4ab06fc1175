//! Permission store client
//!
//! Fetches the authoritative role and route lists. Any failure is absorbed
//! here: the caller gets the built-in defaults instead of an error.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::authority::PermissionAuthority;
use crate::defaults::{default_roles, default_routes};
use crate::model::{RoleDefinition, RoutePermission};

/// Where the cache refreshes from. Never fails.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn fetch_routes(&self) -> Vec<RoutePermission>;
    async fn fetch_roles(&self) -> Vec<RoleDefinition>;
}

/// [`PermissionSource`] over any [`PermissionAuthority`], falling back to defaults.
#[derive(Clone)]
pub struct StoreClient {
    authority: Arc<dyn PermissionAuthority>,
}

impl StoreClient {
    pub fn new(authority: Arc<dyn PermissionAuthority>) -> Self {
        Self { authority }
    }
}

#[async_trait]
impl PermissionSource for StoreClient {
    async fn fetch_routes(&self) -> Vec<RoutePermission> {
        match self.authority.list_routes().await {
            Ok(routes) => {
                debug!(count = routes.len(), "fetched routes");
                routes
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), "route fetch failed, using defaults");
                default_routes()
            }
        }
    }

    async fn fetch_roles(&self) -> Vec<RoleDefinition> {
        match self.authority.list_roles().await {
            Ok(roles) => {
                debug!(count = roles.len(), "fetched roles");
                roles
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), "role fetch failed, using defaults");
                default_roles()
            }
        }
    }
}
