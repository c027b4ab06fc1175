//! LMDB-backed permission authority
//!
//! Holds roles, route permissions and users. Every mutation runs inside one
//! write transaction that is only committed on success, so a rejected
//! operation leaves no partial state behind.

use std::path::Path;

use async_trait::async_trait;
use byteorder::BigEndian;
use heed::types::{Str, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, instrument};

use crate::authority::PermissionAuthority;
use crate::constants::{ADMIN, DEFAULT_ADMIN_EMAIL, DEFAULT_ROLE_COLOR, MAP_SIZE, SYSTEM_ROLES};
use crate::defaults::{default_admin, default_roles, default_routes, last_default_route_id};
use crate::error::{err, RbacError, Result};
use crate::evaluator;
use crate::model::{
    normalize_role_id, AccessibleRoutes, NewRole, NewRoute, NewUser, RoleDefinition, RoutePatch, RoutePermission,
    UserPatch, UserRecord,
};

// Table type aliases
type DbJson = Database<Str, Str>;
type DbById = Database<U64<BigEndian>, Str>;
type DbU64 = Database<Str, U64<BigEndian>>;

const NEXT_ROUTE_ID: &str = "next_route_id";
const NEXT_USER_ID: &str = "next_user_id";

/// All table handles
struct Tables {
    roles: DbJson,
    /// route id -> record; big-endian keys keep creation order
    routes: DbById,
    /// route path -> id, enforces path uniqueness
    paths: DbU64,
    /// lower-cased email -> record
    users: DbJson,
    meta: DbU64,
}

pub struct LocalAuthority {
    env: Env,
    t: Tables,
}

fn decode<T: DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(err)
}

fn encode<T: Serialize>(v: &T) -> Result<String> {
    serde_json::to_string(v).map_err(err)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

fn parse_route_id(id: &str) -> Result<u64> {
    id.trim().parse().map_err(|_| RbacError::NotFound("Route not found".into()))
}

impl LocalAuthority {
    /// Open (or create) the authority at `path`, seeding defaults on first open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(err)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE)
                .max_dbs(5)
                .open(path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let t = Tables {
            roles: env.create_database(&mut tx, Some("roles")).map_err(err)?,
            routes: env.create_database(&mut tx, Some("routes")).map_err(err)?,
            paths: env.create_database(&mut tx, Some("paths")).map_err(err)?,
            users: env.create_database(&mut tx, Some("users")).map_err(err)?,
            meta: env.create_database(&mut tx, Some("meta")).map_err(err)?,
        };
        tx.commit().map_err(err)?;
        let authority = Self { env, t };
        authority.seed()?;
        Ok(authority)
    }

    fn read<T, F: FnOnce(&Tables, &RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let tx = self.env.read_txn().map_err(err)?;
        f(&self.t, &tx)
    }

    fn write<T, F: FnOnce(&Tables, &mut RwTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = self.env.write_txn().map_err(err)?;
        let r = f(&self.t, &mut tx)?;
        tx.commit().map_err(err)?;
        Ok(r)
    }

    fn seed(&self) -> Result<()> {
        self.write(|t, tx| {
            if t.meta.get(tx, NEXT_ROUTE_ID).map_err(err)?.is_some() {
                return Ok(());
            }
            for role in default_roles() {
                t.roles.put(tx, &role.role_id, &encode(&role)?).map_err(err)?;
            }
            for route in default_routes() {
                let id = parse_route_id(&route.id)?;
                t.routes.put(tx, &id, &encode(&route)?).map_err(err)?;
                t.paths.put(tx, &route.route, &id).map_err(err)?;
            }
            let admin = default_admin();
            t.users.put(tx, &normalize_email(&admin.email), &encode(&admin)?).map_err(err)?;
            t.meta.put(tx, NEXT_ROUTE_ID, &(last_default_route_id() + 1)).map_err(err)?;
            t.meta.put(tx, NEXT_USER_ID, &2).map_err(err)?;
            info!("seeded default roles, routes and administrator");
            Ok(())
        })
    }

    // ========================================================================
    // Roles
    // ========================================================================

    pub fn roles(&self) -> Result<Vec<RoleDefinition>> {
        self.read(|t, tx| all_roles(t, tx))
    }

    pub fn add_role(&self, requester: &str, new: NewRole) -> Result<RoleDefinition> {
        let role_id = normalize_role_id(&new.role_id)?;
        self.write(|t, tx| {
            require_admin(t, tx, requester)?;
            if t.roles.get(tx, &role_id).map_err(err)?.is_some() {
                return Err(RbacError::DuplicateEntity(format!("Role '{}' already exists", role_id)));
            }
            let role = RoleDefinition {
                role_id: role_id.clone(),
                description: new.description,
                color: new.color.filter(|c| !c.trim().is_empty()).unwrap_or_else(|| DEFAULT_ROLE_COLOR.to_string()),
                is_system: false,
            };
            t.roles.put(tx, &role_id, &encode(&role)?).map_err(err)?;
            info!(role = %role_id, requester, "role created");
            Ok(role)
        })
    }

    pub fn remove_role(&self, requester: &str, role_id: &str) -> Result<()> {
        let role_id = normalize_role_id(role_id)?;
        self.write(|t, tx| {
            require_admin(t, tx, requester)?;
            if SYSTEM_ROLES.contains(&role_id.as_str()) {
                return Err(RbacError::ProtectedEntity(format!("Cannot delete system role '{}'", role_id)));
            }
            let role: RoleDefinition = match t.roles.get(tx, &role_id).map_err(err)? {
                Some(s) => decode(s)?,
                None => return Err(RbacError::NotFound(format!("Role '{}' not found", role_id))),
            };
            if role.is_system {
                return Err(RbacError::ProtectedEntity(format!("Cannot delete system role '{}'", role_id)));
            }
            let holders = all_users(t, tx)?.into_iter().filter(|u| u.role == role_id).count();
            if holders > 0 {
                return Err(RbacError::ProtectedEntity(format!(
                    "Role '{}' is still assigned to {} user(s)",
                    role_id, holders
                )));
            }
            t.roles.delete(tx, &role_id).map_err(err)?;
            info!(role = %role_id, requester, "role deleted");
            Ok(())
        })
    }

    // ========================================================================
    // Routes
    // ========================================================================

    pub fn routes(&self) -> Result<Vec<RoutePermission>> {
        self.read(|t, tx| all_routes(t, tx))
    }

    pub fn add_route(&self, requester: &str, new: NewRoute) -> Result<RoutePermission> {
        let path = new.route.trim().to_string();
        if !path.starts_with('/') {
            return Err(RbacError::Invalid(format!("Route '{}' must start with '/'", path)));
        }
        let label = new.label.trim().to_string();
        if label.is_empty() {
            return Err(RbacError::Invalid("Route label cannot be empty".into()));
        }
        self.write(|t, tx| {
            require_admin(t, tx, requester)?;
            if t.paths.get(tx, &path).map_err(err)?.is_some() {
                return Err(RbacError::DuplicateEntity(format!("Route '{}' already exists", path)));
            }
            let allowed_roles = known_roles(t, tx, &new.allowed_roles)?;
            let id = next_id(t, tx, NEXT_ROUTE_ID)?;
            let route = RoutePermission {
                id: id.to_string(),
                route: path.clone(),
                label,
                allowed_roles,
                is_enabled: true,
                description: new.description,
            };
            t.routes.put(tx, &id, &encode(&route)?).map_err(err)?;
            t.paths.put(tx, &path, &id).map_err(err)?;
            info!(route = %path, id, requester, "route created");
            Ok(route)
        })
    }

    pub fn patch_route(&self, requester: &str, id: &str, mut patch: RoutePatch) -> Result<RoutePermission> {
        let key = parse_route_id(id)?;
        self.write(|t, tx| {
            require_admin(t, tx, requester)?;
            let mut route: RoutePermission = match t.routes.get(tx, &key).map_err(err)? {
                Some(s) => decode(s)?,
                None => return Err(RbacError::NotFound("Route not found".into())),
            };
            if let Some(roles) = patch.allowed_roles.take() {
                patch.allowed_roles = Some(known_roles(t, tx, &roles)?);
            }
            patch.apply(&mut route);
            t.routes.put(tx, &key, &encode(&route)?).map_err(err)?;
            info!(route = %route.route, id = key, enabled = route.is_enabled, requester, "route updated");
            Ok(route)
        })
    }

    pub fn remove_route(&self, requester: &str, id: &str) -> Result<()> {
        let key = parse_route_id(id)?;
        self.write(|t, tx| {
            require_admin(t, tx, requester)?;
            let route: RoutePermission = match t.routes.get(tx, &key).map_err(err)? {
                Some(s) => decode(s)?,
                None => return Err(RbacError::NotFound("Route not found".into())),
            };
            t.routes.delete(tx, &key).map_err(err)?;
            t.paths.delete(tx, &route.route).map_err(err)?;
            info!(route = %route.route, id = key, requester, "route deleted");
            Ok(())
        })
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub fn users(&self, requester: &str) -> Result<Vec<UserRecord>> {
        self.read(|t, tx| {
            require_admin(t, tx, requester)?;
            all_users(t, tx)
        })
    }

    pub fn add_user(&self, requester: &str, new: NewUser) -> Result<UserRecord> {
        let email = normalize_email(&new.email);
        if email.is_empty() || !email.contains('@') {
            return Err(RbacError::Invalid(format!("Invalid email '{}'", new.email.trim())));
        }
        self.write(|t, tx| {
            require_admin(t, tx, requester)?;
            if t.users.get(tx, &email).map_err(err)?.is_some() {
                return Err(RbacError::DuplicateEntity(format!("User '{}' already exists", email)));
            }
            let role = known_role(t, tx, &new.role)?;
            let n = next_id(t, tx, NEXT_USER_ID)?;
            let user = UserRecord {
                user_id: format!("user-{}", n),
                email: email.clone(),
                display_name: new.display_name.trim().to_string(),
                role,
                is_enabled: true,
            };
            t.users.put(tx, &email, &encode(&user)?).map_err(err)?;
            info!(user = %email, role = %user.role, requester, "user created");
            Ok(user)
        })
    }

    pub fn patch_user(&self, requester: &str, email: &str, patch: UserPatch) -> Result<UserRecord> {
        let email = normalize_email(email);
        self.write(|t, tx| {
            require_admin(t, tx, requester)?;
            let mut user = find_user(t, tx, &email)?;
            if email == DEFAULT_ADMIN_EMAIL {
                let demoted = patch.role.as_deref().map_or(false, |r| !r.trim().eq_ignore_ascii_case(ADMIN));
                if demoted || patch.is_enabled == Some(false) {
                    return Err(RbacError::ProtectedEntity("Cannot disable or demote the default administrator".into()));
                }
            }
            if let Some(role) = patch.role {
                user.role = known_role(t, tx, &role)?;
            }
            if let Some(name) = patch.display_name {
                user.display_name = name.trim().to_string();
            }
            if let Some(enabled) = patch.is_enabled {
                user.is_enabled = enabled;
            }
            t.users.put(tx, &email, &encode(&user)?).map_err(err)?;
            info!(user = %email, role = %user.role, enabled = user.is_enabled, requester, "user updated");
            Ok(user)
        })
    }

    pub fn remove_user(&self, requester: &str, email: &str) -> Result<()> {
        let email = normalize_email(email);
        self.write(|t, tx| {
            require_admin(t, tx, requester)?;
            let user = find_user(t, tx, &email)?;
            if user.email == DEFAULT_ADMIN_EMAIL {
                return Err(RbacError::ProtectedEntity("Cannot delete the default administrator".into()));
            }
            t.users.delete(tx, &email).map_err(err)?;
            info!(user = %email, requester, "user deleted");
            Ok(())
        })
    }

    // ========================================================================
    // Identity-bound queries
    // ========================================================================

    pub fn user(&self, email: &str) -> Result<UserRecord> {
        self.read(|t, tx| find_user(t, tx, &normalize_email(email)))
    }

    pub fn routes_for(&self, email: &str) -> Result<AccessibleRoutes> {
        self.read(|t, tx| {
            let user = find_user(t, tx, &normalize_email(email))?;
            if !user.is_enabled {
                return Err(RbacError::AccountDisabled("User account is disabled".into()));
            }
            let routes = all_routes(t, tx)?;
            Ok(AccessibleRoutes {
                routes: evaluator::accessible_routes(&routes, Some(&user.role)),
                role: user.role,
            })
        })
    }

    pub fn check(&self, email: &str, route: &str) -> Result<bool> {
        self.read(|t, tx| {
            let user = find_user(t, tx, &normalize_email(email))?;
            if !user.is_enabled {
                return Ok(false);
            }
            Ok(evaluator::can_access(&all_routes(t, tx)?, route, Some(&user.role)))
        })
    }
}

// ============================================================================
// Table helpers
// ============================================================================

fn all_roles(t: &Tables, tx: &RoTxn) -> Result<Vec<RoleDefinition>> {
    let mut r = Vec::new();
    for item in t.roles.iter(tx).map_err(err)? {
        let (_, v) = item.map_err(err)?;
        r.push(decode(v)?);
    }
    Ok(r)
}

fn all_routes(t: &Tables, tx: &RoTxn) -> Result<Vec<RoutePermission>> {
    let mut r = Vec::new();
    for item in t.routes.iter(tx).map_err(err)? {
        let (_, v) = item.map_err(err)?;
        r.push(decode(v)?);
    }
    Ok(r)
}

fn all_users(t: &Tables, tx: &RoTxn) -> Result<Vec<UserRecord>> {
    let mut r = Vec::new();
    for item in t.users.iter(tx).map_err(err)? {
        let (_, v) = item.map_err(err)?;
        r.push(decode(v)?);
    }
    Ok(r)
}

fn find_user(t: &Tables, tx: &RoTxn, email: &str) -> Result<UserRecord> {
    match t.users.get(tx, email).map_err(err)? {
        Some(s) => decode(s),
        None => Err(RbacError::NotFound(format!("User '{}' not found", email))),
    }
}

/// Mutations require an enabled administrator.
fn require_admin(t: &Tables, tx: &RoTxn, requester: &str) -> Result<()> {
    let email = normalize_email(requester);
    match t.users.get(tx, &email).map_err(err)? {
        Some(s) => {
            let user: UserRecord = decode(s)?;
            if user.is_enabled && evaluator::is_admin(&user.role) {
                Ok(())
            } else {
                Err(RbacError::Forbidden(format!("{} is not an administrator", email)))
            }
        }
        None => Err(RbacError::Forbidden(format!("{} is not a known user", email))),
    }
}

fn known_role(t: &Tables, tx: &RoTxn, raw: &str) -> Result<String> {
    let id = normalize_role_id(raw)?;
    if t.roles.get(tx, &id).map_err(err)?.is_none() {
        return Err(RbacError::Invalid(format!("Unknown role '{}'", id)));
    }
    Ok(id)
}

/// Normalize, de-duplicate (first occurrence wins) and check every role exists.
fn known_roles(t: &Tables, tx: &RoTxn, raw: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for r in raw {
        let id = known_role(t, tx, r)?;
        if !out.contains(&id) {
            out.push(id);
        }
    }
    Ok(out)
}

fn next_id(t: &Tables, tx: &mut RwTxn, counter: &str) -> Result<u64> {
    let id = t.meta.get(tx, counter).map_err(err)?.unwrap_or(1);
    t.meta.put(tx, counter, &(id + 1)).map_err(err)?;
    Ok(id)
}

// ============================================================================
// PermissionAuthority
// ============================================================================

#[async_trait]
impl PermissionAuthority for LocalAuthority {
    async fn list_roles(&self) -> Result<Vec<RoleDefinition>> {
        self.roles()
    }

    #[instrument(skip(self, role), fields(role = %role.role_id))]
    async fn create_role(&self, requester: &str, role: NewRole) -> Result<RoleDefinition> {
        self.add_role(requester, role)
    }

    #[instrument(skip(self))]
    async fn delete_role(&self, requester: &str, role_id: &str) -> Result<()> {
        self.remove_role(requester, role_id)
    }

    async fn list_routes(&self) -> Result<Vec<RoutePermission>> {
        self.routes()
    }

    #[instrument(skip(self, route), fields(route = %route.route))]
    async fn create_route(&self, requester: &str, route: NewRoute) -> Result<RoutePermission> {
        self.add_route(requester, route)
    }

    #[instrument(skip(self, patch))]
    async fn update_route(&self, requester: &str, id: &str, patch: RoutePatch) -> Result<RoutePermission> {
        self.patch_route(requester, id, patch)
    }

    #[instrument(skip(self))]
    async fn delete_route(&self, requester: &str, id: &str) -> Result<()> {
        self.remove_route(requester, id)
    }

    async fn list_users(&self, requester: &str) -> Result<Vec<UserRecord>> {
        self.users(requester)
    }

    #[instrument(skip(self, user), fields(user = %user.email))]
    async fn create_user(&self, requester: &str, user: NewUser) -> Result<UserRecord> {
        self.add_user(requester, user)
    }

    #[instrument(skip(self, patch))]
    async fn update_user(&self, requester: &str, email: &str, patch: UserPatch) -> Result<UserRecord> {
        self.patch_user(requester, email, patch)
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, requester: &str, email: &str) -> Result<()> {
        self.remove_user(requester, email)
    }

    async fn verify_user(&self, email: &str) -> Result<UserRecord> {
        self.user(email)
    }

    async fn accessible_routes(&self, email: &str) -> Result<AccessibleRoutes> {
        self.routes_for(email)
    }

    async fn check_permission(&self, email: &str, route: &str) -> Result<bool> {
        self.check(email, route)
    }
}
