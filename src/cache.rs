//! Local permission cache
//!
//! Synchronously readable snapshot of routes and roles for the evaluator.
//! A miss answers with the built-in defaults at once and populates the
//! snapshot in the background; stored routes are always reconciled against
//! the default seed so a default route is never lost.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::client::PermissionSource;
use crate::constants::{CACHE_ROLES_KEY, CACHE_ROUTES_KEY, EVENT_CAPACITY};
use crate::defaults::{default_roles, default_routes};
use crate::error::{err, Result};
use crate::evaluator;
use crate::model::{RoleDefinition, RoutePermission};
use crate::storage::KeyValueStore;

/// Change notification sent after a snapshot is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    RoutesUpdated,
    RolesUpdated,
}

/// Union of `stored` and `defaults` keyed by `route`.
///
/// Stored entries come first, unchanged and in order. A default is appended
/// only when no stored entry has the same `route` string.
pub fn reconcile(stored: Vec<RoutePermission>, defaults: &[RoutePermission]) -> Vec<RoutePermission> {
    let mut seen: HashSet<String> = stored.iter().map(|r| r.route.clone()).collect();
    let mut merged = stored;
    for d in defaults {
        if seen.insert(d.route.clone()) {
            merged.push(d.clone());
        }
    }
    merged
}

pub struct PermissionCache {
    store: Arc<dyn KeyValueStore>,
    source: Arc<dyn PermissionSource>,
    events: broadcast::Sender<CacheEvent>,
    routes_loading: Arc<AtomicBool>,
    roles_loading: Arc<AtomicBool>,
}

impl PermissionCache {
    pub fn new(store: Arc<dyn KeyValueStore>, source: Arc<dyn PermissionSource>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            source,
            events,
            routes_loading: Arc::new(AtomicBool::new(false)),
            roles_loading: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Cached routes reconciled with the defaults, or the defaults on a miss.
    pub fn get_routes(&self) -> Vec<RoutePermission> {
        let defaults = default_routes();
        match self.load::<Vec<RoutePermission>>(CACHE_ROUTES_KEY) {
            Some(stored) => reconcile(stored, &defaults),
            None => {
                self.populate_routes();
                defaults
            }
        }
    }

    /// Cached roles, or the defaults on a miss.
    pub fn get_roles(&self) -> Vec<RoleDefinition> {
        match self.load::<Vec<RoleDefinition>>(CACHE_ROLES_KEY) {
            Some(roles) => roles,
            None => {
                self.populate_roles();
                default_roles()
            }
        }
    }

    pub fn can_access(&self, route: &str, role: Option<&str>) -> bool {
        evaluator::can_access(&self.get_routes(), route, role)
    }

    pub fn accessible_routes(&self, role: Option<&str>) -> Vec<RoutePermission> {
        evaluator::accessible_routes(&self.get_routes(), role)
    }

    /// `None` for a missing, unreadable or corrupt snapshot.
    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "discarding corrupt cache snapshot");
                None
            }
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Persist a route snapshot and notify subscribers.
    pub fn save(&self, routes: &[RoutePermission]) -> Result<()> {
        write_snapshot(self.store.as_ref(), CACHE_ROUTES_KEY, routes)?;
        notify(&self.events, CacheEvent::RoutesUpdated);
        Ok(())
    }

    pub fn save_roles(&self, roles: &[RoleDefinition]) -> Result<()> {
        write_snapshot(self.store.as_ref(), CACHE_ROLES_KEY, roles)?;
        notify(&self.events, CacheEvent::RolesUpdated);
        Ok(())
    }

    /// Force-refresh both snapshots from the source, overwriting unconditionally.
    pub async fn initialize(&self) -> Result<()> {
        let routes = self.source.fetch_routes().await;
        self.save(&routes)?;
        let roles = self.source.fetch_roles().await;
        self.save_roles(&roles)?;
        debug!(routes = routes.len(), roles = roles.len(), "cache initialized");
        Ok(())
    }

    // ========================================================================
    // Background population
    // ========================================================================

    fn populate_routes(&self) {
        let store = self.store.clone();
        let source = self.source.clone();
        let events = self.events.clone();
        spawn_once(self.routes_loading.clone(), async move {
            let routes = source.fetch_routes().await;
            match write_snapshot(store.as_ref(), CACHE_ROUTES_KEY, &routes) {
                Ok(()) => notify(&events, CacheEvent::RoutesUpdated),
                Err(e) => warn!(error = %e, "background route population failed"),
            }
        });
    }

    fn populate_roles(&self) {
        let store = self.store.clone();
        let source = self.source.clone();
        let events = self.events.clone();
        spawn_once(self.roles_loading.clone(), async move {
            let roles = source.fetch_roles().await;
            match write_snapshot(store.as_ref(), CACHE_ROLES_KEY, &roles) {
                Ok(()) => notify(&events, CacheEvent::RolesUpdated),
                Err(e) => warn!(error = %e, "background role population failed"),
            }
        });
    }
}

fn write_snapshot<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value).map_err(err)?;
    store.set(key, &json)
}

fn notify(events: &broadcast::Sender<CacheEvent>, event: CacheEvent) {
    // no subscribers is fine
    let _ = events.send(event);
}

/// Clears the in-flight flag however the task ends, including when its
/// runtime shuts down mid-fetch.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Spawn `task` unless one guarded by `flag` is still running.
fn spawn_once<F>(flag: Arc<AtomicBool>, task: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(h) => h,
        Err(_) => {
            debug!("no runtime, skipping background cache population");
            return;
        }
    };
    if flag.swap(true, Ordering::AcqRel) {
        debug!("background cache population already in flight");
        return;
    }
    let in_flight = InFlight(flag);
    handle.spawn(async move {
        let _in_flight = in_flight;
        task.await;
    });
}
