//! Routegate - role-based route access control
//!
//! A route permission model (roles, exact and `/*` wildcard route entries),
//! a pure access evaluator, a locally persisted permission cache that falls
//! back to built-in defaults, a session resolver and a navigation guard.
//!
//! The authoritative data lives behind [`PermissionAuthority`]: either the
//! LMDB-backed [`LocalAuthority`] or, with the `client` feature, a remote one
//! reached through `HttpAuthority`. The `server` feature exposes a
//! `LocalAuthority` over HTTP.

pub mod authority;
pub mod backend;
pub mod cache;
pub mod client;
pub mod config;
pub mod constants;
pub mod defaults;
pub mod error;
pub mod evaluator;
pub mod guard;
pub mod model;
pub mod session;
pub mod storage;
pub mod wire;

#[cfg(feature = "client")]
pub mod http;
#[cfg(feature = "server")]
pub mod server;

pub use authority::PermissionAuthority;
pub use backend::LocalAuthority;
pub use cache::{reconcile, CacheEvent, PermissionCache};
pub use client::{PermissionSource, StoreClient};
pub use config::{Config, GuardConfig};
pub use defaults::{default_roles, default_routes};
pub use error::{RbacError, Result};
pub use evaluator::{accessible_routes, can_access, find_permission, is_admin, RoutePattern};
pub use guard::{GuardDecision, RouteGuard};
pub use model::{
    AccessibleRoutes, Identity, NewRole, NewRoute, NewUser, RoleDefinition, RoutePatch, RoutePermission, UserPatch,
    UserRecord,
};
pub use session::{SessionResolver, SessionUser, SessionView};
pub use storage::{KeyValueStore, LmdbStore, MemoryStore};

#[cfg(feature = "client")]
pub use http::HttpAuthority;
