//! Shared fakes for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use routegate::{
    AccessibleRoutes, NewRole, NewRoute, NewUser, PermissionAuthority, RbacError, Result, RoleDefinition, RoutePatch,
    RoutePermission, UserPatch, UserRecord,
};
use tokio::sync::Notify;

/// Authority whose every call fails as if the network were down.
#[derive(Default)]
pub struct Unreachable {
    pub calls: AtomicUsize,
}

impl Unreachable {
    fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RbacError::StoreUnavailable("connection refused".into()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionAuthority for Unreachable {
    async fn list_roles(&self) -> Result<Vec<RoleDefinition>> {
        self.fail()
    }
    async fn create_role(&self, _: &str, _: NewRole) -> Result<RoleDefinition> {
        self.fail()
    }
    async fn delete_role(&self, _: &str, _: &str) -> Result<()> {
        self.fail()
    }
    async fn list_routes(&self) -> Result<Vec<RoutePermission>> {
        self.fail()
    }
    async fn create_route(&self, _: &str, _: NewRoute) -> Result<RoutePermission> {
        self.fail()
    }
    async fn update_route(&self, _: &str, _: &str, _: RoutePatch) -> Result<RoutePermission> {
        self.fail()
    }
    async fn delete_route(&self, _: &str, _: &str) -> Result<()> {
        self.fail()
    }
    async fn list_users(&self, _: &str) -> Result<Vec<UserRecord>> {
        self.fail()
    }
    async fn create_user(&self, _: &str, _: NewUser) -> Result<UserRecord> {
        self.fail()
    }
    async fn update_user(&self, _: &str, _: &str, _: UserPatch) -> Result<UserRecord> {
        self.fail()
    }
    async fn delete_user(&self, _: &str, _: &str) -> Result<()> {
        self.fail()
    }
    async fn verify_user(&self, _: &str) -> Result<UserRecord> {
        self.fail()
    }
    async fn accessible_routes(&self, _: &str) -> Result<AccessibleRoutes> {
        self.fail()
    }
    async fn check_permission(&self, _: &str, _: &str) -> Result<bool> {
        self.fail()
    }
}

/// Delegating authority that can park one `accessible_routes` call.
///
/// Set `hold` and the next route fetch signals `started`, then waits for
/// `release` before asking the inner authority.
pub struct GatedAuthority {
    inner: Arc<dyn PermissionAuthority>,
    pub hold: AtomicBool,
    pub started: Notify,
    pub release: Notify,
}

impl GatedAuthority {
    pub fn new(inner: Arc<dyn PermissionAuthority>) -> Self {
        Self { inner, hold: AtomicBool::new(false), started: Notify::new(), release: Notify::new() }
    }
}

#[async_trait]
impl PermissionAuthority for GatedAuthority {
    async fn list_roles(&self) -> Result<Vec<RoleDefinition>> {
        self.inner.list_roles().await
    }
    async fn create_role(&self, requester: &str, role: NewRole) -> Result<RoleDefinition> {
        self.inner.create_role(requester, role).await
    }
    async fn delete_role(&self, requester: &str, role_id: &str) -> Result<()> {
        self.inner.delete_role(requester, role_id).await
    }
    async fn list_routes(&self) -> Result<Vec<RoutePermission>> {
        self.inner.list_routes().await
    }
    async fn create_route(&self, requester: &str, route: NewRoute) -> Result<RoutePermission> {
        self.inner.create_route(requester, route).await
    }
    async fn update_route(&self, requester: &str, id: &str, patch: RoutePatch) -> Result<RoutePermission> {
        self.inner.update_route(requester, id, patch).await
    }
    async fn delete_route(&self, requester: &str, id: &str) -> Result<()> {
        self.inner.delete_route(requester, id).await
    }
    async fn list_users(&self, requester: &str) -> Result<Vec<UserRecord>> {
        self.inner.list_users(requester).await
    }
    async fn create_user(&self, requester: &str, user: NewUser) -> Result<UserRecord> {
        self.inner.create_user(requester, user).await
    }
    async fn update_user(&self, requester: &str, email: &str, patch: UserPatch) -> Result<UserRecord> {
        self.inner.update_user(requester, email, patch).await
    }
    async fn delete_user(&self, requester: &str, email: &str) -> Result<()> {
        self.inner.delete_user(requester, email).await
    }
    async fn verify_user(&self, email: &str) -> Result<UserRecord> {
        self.inner.verify_user(email).await
    }
    async fn accessible_routes(&self, email: &str) -> Result<AccessibleRoutes> {
        if self.hold.swap(false, Ordering::SeqCst) {
            self.started.notify_one();
            self.release.notified().await;
        }
        self.inner.accessible_routes(email).await
    }
    async fn check_permission(&self, email: &str, route: &str) -> Result<bool> {
        self.inner.check_permission(email, route).await
    }
}

pub fn new_route(route: &str, roles: &[&str]) -> NewRoute {
    NewRoute {
        route: route.to_string(),
        label: route.trim_start_matches('/').to_string(),
        allowed_roles: roles.iter().map(|r| r.to_string()).collect(),
        description: None,
    }
}

pub fn new_user(email: &str, role: &str) -> NewUser {
    NewUser { email: email.to_string(), display_name: "Test User".to_string(), role: role.to_string() }
}
