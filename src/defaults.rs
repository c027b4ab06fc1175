//! Built-in roles, the default route seed list and the default administrator

use crate::constants::{ADMIN, ANALYST, DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_ID, DEFAULT_ADMIN_NAME, SUPERVISOR};
use crate::model::{RoleDefinition, RoutePermission, UserRecord};

const ROLES: &[(&str, &str, &str)] = &[
    (
        ADMIN,
        "Full system access including user and permission management",
        "bg-red-500/10 text-red-500 border-red-500/20",
    ),
    (
        SUPERVISOR,
        "Access to reporting, analytics, and team oversight",
        "bg-blue-500/10 text-blue-500 border-blue-500/20",
    ),
    (
        ANALYST,
        "Read-only access to metrics and historical reports",
        "bg-green-500/10 text-green-500 border-green-500/20",
    ),
];

const ALL: &[&str] = &[ADMIN, SUPERVISOR, ANALYST];
const LEADS: &[&str] = &[ADMIN, SUPERVISOR];
const ADMINS: &[&str] = &[ADMIN];

// (id, route, label, allowed roles)
const ROUTES: &[(&str, &str, &str, &[&str])] = &[
    ("1", "/dashboard", "Dashboard", ALL),
    ("2", "/queues/matrix", "Queue Matrix", ALL),
    ("3", "/metrics/real-time", "Real-Time Metrics", LEADS),
    ("4", "/metrics/historical", "Historical Metrics", ALL),
    ("5", "/analytics", "Contact Lens", LEADS),
    ("6", "/search", "Contact Search", LEADS),
    ("7", "/evaluations", "Evaluations", ADMINS),
    ("8", "/admin/users", "User Management", ADMINS),
    ("9", "/admin/rbac", "RBAC Settings", ADMINS),
    ("10", "/settings", "Settings", ALL),
    ("11", "/dashboard/overview", "Dashboard Overview", ALL),
    ("12", "/agents/performance", "Agent Performance", LEADS),
    ("13", "/reports/time-analysis", "Time Analysis Reports", ALL),
    ("14", "/calls/missed", "Missed Calls", LEADS),
];

/// The three system roles.
pub fn default_roles() -> Vec<RoleDefinition> {
    ROLES
        .iter()
        .map(|(id, description, color)| RoleDefinition {
            role_id: id.to_string(),
            description: description.to_string(),
            color: color.to_string(),
            is_system: true,
        })
        .collect()
}

/// The fixed seed list. Every entry stays in the effective permission set.
pub fn default_routes() -> Vec<RoutePermission> {
    ROUTES
        .iter()
        .map(|(id, route, label, roles)| RoutePermission {
            id: id.to_string(),
            route: route.to_string(),
            label: label.to_string(),
            allowed_roles: roles.iter().map(|r| r.to_string()).collect(),
            is_enabled: true,
            description: None,
        })
        .collect()
}

/// Highest id used by the seed list; authority-assigned ids start after it.
pub fn last_default_route_id() -> u64 {
    ROUTES.len() as u64
}

pub fn default_admin() -> UserRecord {
    UserRecord {
        user_id: DEFAULT_ADMIN_ID.to_string(),
        email: DEFAULT_ADMIN_EMAIL.to_string(),
        display_name: DEFAULT_ADMIN_NAME.to_string(),
        role: ADMIN.to_string(),
        is_enabled: true,
    }
}
