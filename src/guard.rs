//! Route guard
//!
//! Per-navigation decision over the current session view. Access checks use
//! the local cache, so a navigation during an in-flight fetch sees whatever
//! snapshot is cached.

use std::sync::Arc;

use tracing::debug;

use crate::cache::PermissionCache;
use crate::config::GuardConfig;
use crate::session::SessionView;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Identity resolution in flight; show a neutral indicator.
    Loading,
    Render,
    Redirect(String),
}

pub struct RouteGuard {
    cache: Arc<PermissionCache>,
    config: GuardConfig,
}

impl RouteGuard {
    pub fn new(cache: Arc<PermissionCache>, config: GuardConfig) -> Self {
        Self { cache, config }
    }

    pub fn decide(&self, session: &SessionView, path: &str) -> GuardDecision {
        if session.loading {
            return GuardDecision::Loading;
        }
        let Some(role) = session.role() else {
            if self.config.is_public(path) {
                return GuardDecision::Render;
            }
            debug!(path, "unauthenticated, redirecting to login");
            return GuardDecision::Redirect(self.config.login_route.clone());
        };
        if path == self.config.login_route {
            return GuardDecision::Redirect(self.config.landing_route.clone());
        }
        if path == self.config.unauthorized_route || self.config.is_public(path) {
            return GuardDecision::Render;
        }
        if self.cache.can_access(path, Some(role)) {
            GuardDecision::Render
        } else {
            debug!(path, role, "access denied, redirecting");
            GuardDecision::Redirect(self.config.unauthorized_route.clone())
        }
    }
}
