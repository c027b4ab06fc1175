//! Access evaluation (pure, no I/O)
//!
//! A permission entry matches a path when it is equal to it, or when the
//! entry is a `/*` wildcard whose base is the path or a segment-aligned
//! prefix of it. When several entries match, the most specific one decides:
//! an exact entry beats every wildcard, and a longer wildcard base beats a
//! shorter one. Entry order never matters.

use tracing::debug;

use crate::constants::{ADMIN, WILDCARD_SUFFIX};
use crate::model::RoutePermission;

/// Parsed form of a permission entry's `route`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePattern<'a> {
    Exact(&'a str),
    /// Wildcard entry; holds the text before `/*`.
    Prefix(&'a str),
}

impl<'a> RoutePattern<'a> {
    pub fn parse(route: &'a str) -> Self {
        match route.strip_suffix(WILDCARD_SUFFIX) {
            Some(base) => RoutePattern::Prefix(base),
            None => RoutePattern::Exact(route),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match *self {
            RoutePattern::Exact(p) => p == path,
            RoutePattern::Prefix(base) => match path.strip_prefix(base) {
                Some(rest) => rest.is_empty() || rest.starts_with('/') || base.is_empty(),
                None => false,
            },
        }
    }

    /// Ranking among matching entries; higher wins.
    #[inline]
    fn specificity(&self) -> (bool, usize) {
        match *self {
            RoutePattern::Exact(p) => (true, p.len()),
            RoutePattern::Prefix(base) => (false, base.len()),
        }
    }
}

#[inline]
pub fn is_admin(role: &str) -> bool {
    role == ADMIN
}

/// The entry that governs `route`, if any.
pub fn find_permission<'a>(permissions: &'a [RoutePermission], route: &str) -> Option<&'a RoutePermission> {
    let mut best: Option<(&RoutePermission, (bool, usize))> = None;
    for p in permissions {
        let pattern = RoutePattern::parse(&p.route);
        if !pattern.matches(route) {
            continue;
        }
        let rank = pattern.specificity();
        // strict `>` keeps the earliest entry on an exact tie
        if best.map_or(true, |(_, r)| rank > r) {
            best = Some((p, rank));
        }
    }
    best.map(|(p, _)| p)
}

/// Decide whether `role` may view `route`.
///
/// No role denies. `ADMIN` is allowed before any entry is looked at, so
/// neither the allowed-role list nor the enabled flag can gate it.
pub fn can_access(permissions: &[RoutePermission], route: &str, role: Option<&str>) -> bool {
    let Some(role) = role else { return false };
    if is_admin(role) {
        return true;
    }
    match find_permission(permissions, route) {
        Some(p) => {
            let allowed = p.is_enabled && p.allows_role(role);
            if !allowed {
                debug!(route, role, entry = %p.route, enabled = p.is_enabled, "access denied");
            }
            allowed
        }
        None => {
            debug!(route, role, "access denied: no matching entry");
            false
        }
    }
}

/// Enabled entries `role` may navigate to; empty without a role.
pub fn accessible_routes(permissions: &[RoutePermission], role: Option<&str>) -> Vec<RoutePermission> {
    if role.is_none() {
        return Vec::new();
    }
    permissions
        .iter()
        .filter(|p| p.is_enabled && can_access(permissions, &p.route, role))
        .cloned()
        .collect()
}
