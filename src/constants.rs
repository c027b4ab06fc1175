//! Role ids, storage keys and well-known routes

// Built-in roles (always present, never deletable)
pub const ADMIN: &str = "ADMIN";
pub const SUPERVISOR: &str = "SUPERVISOR";
pub const ANALYST: &str = "ANALYST";
pub const SYSTEM_ROLES: &[&str] = &[ADMIN, SUPERVISOR, ANALYST];

// The administrator account seeded on first open; cannot be deleted
pub const DEFAULT_ADMIN_ID: &str = "admin-1";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@routegate.local";
pub const DEFAULT_ADMIN_NAME: &str = "Administrator";

pub const DEFAULT_ROLE_COLOR: &str = "bg-gray-500/10 text-gray-500 border-gray-500/20";

// Local persistence keys
pub const CACHE_ROUTES_KEY: &str = "routegate_routes";
pub const CACHE_ROLES_KEY: &str = "routegate_roles";
pub const SESSION_TOKEN_KEY: &str = "routegate_session_token";
pub const SESSION_USER_KEY: &str = "routegate_session_user";

// Suffix marking a wildcard route entry
pub const WILDCARD_SUFFIX: &str = "/*";

// Navigation endpoints
pub const LOGIN_ROUTE: &str = "/login";
pub const CALLBACK_ROUTE: &str = "/auth/callback";
pub const LANDING_ROUTE: &str = "/dashboard";
pub const UNAUTHORIZED_ROUTE: &str = "/unauthorized";

// Broadcast capacity for cache change notifications
pub const EVENT_CAPACITY: usize = 16;

// LMDB map size for local stores
pub const MAP_SIZE: usize = 1 << 26;
