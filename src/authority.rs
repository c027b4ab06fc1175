//! Permission authority interface
//!
//! The remote RBAC backend as seen by the rest of the crate. Implemented by
//! [`crate::backend::LocalAuthority`] (in-process, LMDB) and, with the
//! `client` feature, by `HttpAuthority`.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    AccessibleRoutes, NewRole, NewRoute, NewUser, RoleDefinition, RoutePatch, RoutePermission, UserPatch, UserRecord,
};

/// Every mutation carries the email of the requesting user.
#[async_trait]
pub trait PermissionAuthority: Send + Sync {
    // Roles
    async fn list_roles(&self) -> Result<Vec<RoleDefinition>>;
    async fn create_role(&self, requester: &str, role: NewRole) -> Result<RoleDefinition>;
    async fn delete_role(&self, requester: &str, role_id: &str) -> Result<()>;

    // Routes
    async fn list_routes(&self) -> Result<Vec<RoutePermission>>;
    async fn create_route(&self, requester: &str, route: NewRoute) -> Result<RoutePermission>;
    async fn update_route(&self, requester: &str, id: &str, patch: RoutePatch) -> Result<RoutePermission>;
    async fn delete_route(&self, requester: &str, id: &str) -> Result<()>;

    // Users
    async fn list_users(&self, requester: &str) -> Result<Vec<UserRecord>>;
    async fn create_user(&self, requester: &str, user: NewUser) -> Result<UserRecord>;
    async fn update_user(&self, requester: &str, email: &str, patch: UserPatch) -> Result<UserRecord>;
    async fn delete_user(&self, requester: &str, email: &str) -> Result<()>;

    // Identity-bound queries
    async fn verify_user(&self, email: &str) -> Result<UserRecord>;
    async fn accessible_routes(&self, email: &str) -> Result<AccessibleRoutes>;
    async fn check_permission(&self, email: &str, route: &str) -> Result<bool>;
}
