//! Session and role resolution
//!
//! Binds an externally verified identity to a role and to the accessible
//! route list fetched from the authority (not from the local cache). The
//! session lives as long as the resolver; its token and user record are
//! persisted so a restart can restore it.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::authority::PermissionAuthority;
use crate::config::GuardConfig;
use crate::constants::{SESSION_TOKEN_KEY, SESSION_USER_KEY};
use crate::error::{err, RbacError, Result};
use crate::model::{Identity, RoutePermission, UserRecord};
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub role: String,
}

impl SessionUser {
    fn from_record(user: UserRecord, identity: &Identity) -> Self {
        let display_name = if user.display_name.is_empty() { identity.display_name.clone() } else { user.display_name };
        Self { user_id: user.user_id, email: user.email, display_name, role: user.role }
    }
}

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    /// Identity resolution in flight; no redirect decisions while set.
    pub loading: bool,
    pub user: Option<SessionUser>,
    pub token: Option<String>,
    pub accessible_routes: Vec<RoutePermission>,
}

impl SessionView {
    pub fn role(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.role.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

pub struct SessionResolver {
    authority: Arc<dyn PermissionAuthority>,
    store: Arc<dyn KeyValueStore>,
    guard: GuardConfig,
    state: RwLock<SessionView>,
}

impl SessionResolver {
    /// Starts in the loading state until [`restore`](Self::restore) runs.
    pub fn new(authority: Arc<dyn PermissionAuthority>, store: Arc<dyn KeyValueStore>, guard: GuardConfig) -> Self {
        Self { authority, store, guard, state: RwLock::new(SessionView { loading: true, ..SessionView::default() }) }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionView> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionView> {
        self.state.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn snapshot(&self) -> SessionView {
        self.read().clone()
    }

    pub fn role(&self) -> Option<String> {
        self.read().role().map(str::to_string)
    }

    /// Re-establish a persisted session at startup.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Option<SessionUser> {
        let restored = match self.persisted() {
            Ok(Some((token, user))) => {
                {
                    let mut s = self.write();
                    s.user = Some(user.clone());
                    s.token = Some(token);
                }
                self.refresh_routes().await;
                info!(user = %user.email, role = %user.role, "session restored");
                Some(user)
            }
            Ok(None) => {
                debug!("no persisted session");
                None
            }
            Err(e) => {
                warn!(error = %e, "failed to restore session");
                self.clear();
                None
            }
        };
        self.write().loading = false;
        restored
    }

    fn persisted(&self) -> Result<Option<(String, SessionUser)>> {
        let token = self.store.get(SESSION_TOKEN_KEY)?;
        let user = self.store.get(SESSION_USER_KEY)?;
        match (token, user) {
            (Some(token), Some(user)) => Ok(Some((token, serde_json::from_str(&user).map_err(err)?))),
            _ => Ok(None),
        }
    }

    /// Finish sign-in for an identity the provider has already verified.
    ///
    /// A disabled account or any verification failure clears the persisted
    /// credential and leaves the resolver unauthenticated. A logout (or a
    /// sign-in as someone else) that lands while the route list is being
    /// fetched fails the call with `Forbidden`; `Ok` always carries the live
    /// session of this identity.
    #[instrument(skip(self, token, identity), fields(email = %identity.email))]
    pub async fn complete_login(&self, token: &str, identity: &Identity) -> Result<SessionView> {
        self.write().loading = true;
        let result = self.establish(token, identity).await;
        if let Err(e) = &result {
            warn!(error = %e, code = e.code(), "login failed");
            self.clear();
        }
        self.write().loading = false;
        let user = result?;
        let view = self.snapshot();
        if view.user.as_ref().map(|u| u.email.as_str()) != Some(user.email.as_str()) {
            warn!(user = %user.email, "session ended before sign-in completed");
            return Err(RbacError::Forbidden("Session ended before sign-in completed".into()));
        }
        Ok(view)
    }

    async fn establish(&self, token: &str, identity: &Identity) -> Result<SessionUser> {
        let record = self.authority.verify_user(&identity.email).await?;
        if !record.is_enabled {
            return Err(RbacError::AccountDisabled("User account is disabled".into()));
        }
        let user = SessionUser::from_record(record, identity);
        self.store.set(SESSION_TOKEN_KEY, token)?;
        self.store.set(SESSION_USER_KEY, &serde_json::to_string(&user).map_err(err)?)?;
        {
            let mut s = self.write();
            s.user = Some(user.clone());
            s.token = Some(token.to_string());
            s.accessible_routes.clear();
        }
        info!(user = %user.email, role = %user.role, "session established");
        self.refresh_routes().await;
        Ok(user)
    }

    /// Re-fetch the accessible route list for the current user.
    ///
    /// Concurrent calls are not deduplicated; the last response to land wins.
    /// A failed fetch leaves an empty list.
    pub async fn refresh_routes(&self) {
        let Some(email) = self.read().user.as_ref().map(|u| u.email.clone()) else {
            return;
        };
        let fetched = self.authority.accessible_routes(&email).await;
        let mut guard = self.write();
        let s = &mut *guard;
        // logged out (or switched user) while the request was in flight
        let Some(user) = s.user.as_mut().filter(|u| u.email == email) else {
            return;
        };
        match fetched {
            Ok(r) => {
                if r.role != user.role {
                    info!(user = %email, from = %user.role, to = %r.role, "role changed");
                    user.role = r.role;
                }
                debug!(user = %email, count = r.routes.len(), "accessible routes refreshed");
                s.accessible_routes = r.routes;
            }
            Err(e) => {
                warn!(user = %email, error = %e, "accessible route fetch failed");
                s.accessible_routes = Vec::new();
            }
        }
    }

    /// Tear down the session. Returns the route to redirect to.
    pub fn logout(&self) -> String {
        if let Some(u) = self.read().user.as_ref() {
            info!(user = %u.email, "logout");
        }
        self.clear();
        self.guard.login_route.clone()
    }

    fn clear(&self) {
        for key in [SESSION_TOKEN_KEY, SESSION_USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "failed to clear persisted session");
            }
        }
        let mut s = self.write();
        s.user = None;
        s.token = None;
        s.accessible_routes.clear();
    }
}
