//! LocalAuthority tests: role, route and user administration

use routegate::constants::{ADMIN, ANALYST, DEFAULT_ADMIN_EMAIL, SUPERVISOR};
use routegate::{
    can_access, LocalAuthority, NewRole, NewRoute, NewUser, PermissionAuthority, RbacError, RoutePatch, UserPatch,
};
use tempfile::TempDir;

const ROOT: &str = DEFAULT_ADMIN_EMAIL;

fn setup() -> (TempDir, LocalAuthority) {
    let dir = TempDir::new().unwrap();
    let auth = LocalAuthority::open(dir.path()).unwrap();
    (dir, auth)
}

fn new_role(id: &str) -> NewRole {
    NewRole { role_id: id.to_string(), description: format!("{} role", id), color: None }
}

fn new_route(route: &str, roles: &[&str]) -> NewRoute {
    NewRoute {
        route: route.to_string(),
        label: route.trim_start_matches('/').to_string(),
        allowed_roles: roles.iter().map(|r| r.to_string()).collect(),
        description: None,
    }
}

fn new_user(email: &str, role: &str) -> NewUser {
    NewUser { email: email.to_string(), display_name: "Test User".to_string(), role: role.to_string() }
}

fn route_id(auth: &LocalAuthority, route: &str) -> String {
    auth.routes().unwrap().into_iter().find(|r| r.route == route).unwrap().id
}

// ============================================================================
// Seeding
// ============================================================================

mod seed_tests {
    use super::*;

    #[test]
    fn first_open_seeds_defaults() {
        let (_dir, auth) = setup();
        let roles: Vec<_> = auth.roles().unwrap().into_iter().map(|r| r.role_id).collect();
        assert!(roles.contains(&ADMIN.to_string()));
        assert!(roles.contains(&SUPERVISOR.to_string()));
        assert!(roles.contains(&ANALYST.to_string()));
        assert_eq!(auth.routes().unwrap().len(), 14);
        assert_eq!(auth.user(ROOT).unwrap().role, ADMIN);
    }

    #[test]
    fn reopen_keeps_changes() {
        let dir = TempDir::new().unwrap();
        {
            let auth = LocalAuthority::open(dir.path()).unwrap();
            auth.add_route(ROOT, new_route("/reports/custom", &[ANALYST])).unwrap();
            auth.remove_route(ROOT, "1").unwrap();
        }
        let auth = LocalAuthority::open(dir.path()).unwrap();
        let routes = auth.routes().unwrap();
        assert!(routes.iter().any(|r| r.route == "/reports/custom"));
        assert!(!routes.iter().any(|r| r.id == "1"));
        assert_eq!(routes.len(), 14);
    }

    #[test]
    fn routes_listed_in_creation_order() {
        let (_dir, auth) = setup();
        auth.add_route(ROOT, new_route("/zz", &[ANALYST])).unwrap();
        let routes = auth.routes().unwrap();
        assert_eq!(routes.first().unwrap().route, "/dashboard");
        assert_eq!(routes.last().unwrap().route, "/zz");
        assert_eq!(routes.last().unwrap().id, "15");
    }
}

// ============================================================================
// Roles
// ============================================================================

mod role_tests {
    use super::*;

    #[test]
    fn create_custom_role_and_route() {
        let (_dir, auth) = setup();
        let role = auth.add_role(ROOT, new_role("manager")).unwrap();
        assert_eq!(role.role_id, "MANAGER");
        assert!(!role.is_system);
        assert!(!role.color.is_empty());

        auth.add_route(ROOT, new_route("/reports/custom", &["MANAGER"])).unwrap();
        let routes = auth.routes().unwrap();
        assert!(can_access(&routes, "/reports/custom", Some("MANAGER")));
        assert!(!can_access(&routes, "/reports/custom", Some(ANALYST)));
    }

    #[test]
    fn duplicate_role_rejected() {
        let (_dir, auth) = setup();
        auth.add_role(ROOT, new_role("MANAGER")).unwrap();
        let e = auth.add_role(ROOT, new_role(" manager ")).unwrap_err();
        assert!(matches!(e, RbacError::DuplicateEntity(_)));
        assert!(matches!(auth.add_role(ROOT, new_role("ADMIN")), Err(RbacError::DuplicateEntity(_))));
    }

    #[test]
    fn system_role_cannot_be_deleted() {
        let (_dir, auth) = setup();
        let before = auth.roles().unwrap();
        for id in [ADMIN, SUPERVISOR, ANALYST] {
            let e = auth.remove_role(ROOT, id).unwrap_err();
            assert!(matches!(e, RbacError::ProtectedEntity(_)), "{}: {:?}", id, e);
        }
        assert_eq!(auth.roles().unwrap(), before);
    }

    #[test]
    fn assigned_role_cannot_be_deleted() {
        let (_dir, auth) = setup();
        auth.add_role(ROOT, new_role("MANAGER")).unwrap();
        auth.add_user(ROOT, new_user("m@corp.io", "MANAGER")).unwrap();
        assert!(matches!(auth.remove_role(ROOT, "MANAGER"), Err(RbacError::ProtectedEntity(_))));

        auth.remove_user(ROOT, "m@corp.io").unwrap();
        auth.remove_role(ROOT, "MANAGER").unwrap();
        assert!(!auth.roles().unwrap().iter().any(|r| r.role_id == "MANAGER"));
    }

    #[test]
    fn delete_unknown_role() {
        let (_dir, auth) = setup();
        assert!(matches!(auth.remove_role(ROOT, "GHOST"), Err(RbacError::NotFound(_))));
    }

    #[test]
    fn invalid_role_id() {
        let (_dir, auth) = setup();
        assert!(matches!(auth.add_role(ROOT, new_role("two words")), Err(RbacError::Invalid(_))));
    }
}

// ============================================================================
// Routes
// ============================================================================

mod route_tests {
    use super::*;

    #[test]
    fn duplicate_route_rejected() {
        let (_dir, auth) = setup();
        let e = auth.add_route(ROOT, new_route("/dashboard", &[ANALYST])).unwrap_err();
        assert!(matches!(e, RbacError::DuplicateEntity(_)));
    }

    #[test]
    fn route_validation() {
        let (_dir, auth) = setup();
        assert!(matches!(auth.add_route(ROOT, new_route("reports", &[ANALYST])), Err(RbacError::Invalid(_))));
        let mut blank = new_route("/blank", &[ANALYST]);
        blank.label = "  ".into();
        assert!(matches!(auth.add_route(ROOT, blank), Err(RbacError::Invalid(_))));
        assert!(matches!(auth.add_route(ROOT, new_route("/x", &["GHOST"])), Err(RbacError::Invalid(_))));
    }

    #[test]
    fn allowed_roles_normalized_and_deduplicated() {
        let (_dir, auth) = setup();
        let r = auth.add_route(ROOT, new_route("/team", &["analyst", "ANALYST", " supervisor"])).unwrap();
        assert_eq!(r.allowed_roles, vec![ANALYST.to_string(), SUPERVISOR.to_string()]);
    }

    #[test]
    fn disable_route_gates_non_admins() {
        let (_dir, auth) = setup();
        let id = route_id(&auth, "/admin/rbac");
        auth.patch_route(ROOT, &id, RoutePatch::roles([ADMIN, SUPERVISOR])).unwrap();
        let updated = auth.patch_route(ROOT, &id, RoutePatch::enabled(false)).unwrap();
        assert!(!updated.is_enabled);
        assert_eq!(updated.allowed_roles, vec![ADMIN.to_string(), SUPERVISOR.to_string()]);

        let routes = auth.routes().unwrap();
        assert!(!can_access(&routes, "/admin/rbac", Some(SUPERVISOR)));
        assert!(can_access(&routes, "/admin/rbac", Some(ADMIN)));
    }

    #[test]
    fn patch_merges_fields() {
        let (_dir, auth) = setup();
        let id = route_id(&auth, "/settings");
        let patch = RoutePatch { label: Some("Preferences".into()), ..RoutePatch::default() };
        let r = auth.patch_route(ROOT, &id, patch).unwrap();
        assert_eq!(r.label, "Preferences");
        assert!(r.is_enabled);
        assert_eq!(r.allowed_roles.len(), 3);
    }

    #[test]
    fn missing_route() {
        let (_dir, auth) = setup();
        assert!(matches!(auth.patch_route(ROOT, "999", RoutePatch::enabled(false)), Err(RbacError::NotFound(_))));
        assert!(matches!(auth.remove_route(ROOT, "abc"), Err(RbacError::NotFound(_))));
    }

    #[test]
    fn deleted_path_can_be_recreated() {
        let (_dir, auth) = setup();
        let id = route_id(&auth, "/settings");
        auth.remove_route(ROOT, &id).unwrap();
        let r = auth.add_route(ROOT, new_route("/settings", &[ANALYST])).unwrap();
        assert_ne!(r.id, id);
    }
}

// ============================================================================
// Users and authorization
// ============================================================================

mod user_tests {
    use super::*;

    #[test]
    fn non_admin_mutations_forbidden() {
        let (_dir, auth) = setup();
        auth.add_user(ROOT, new_user("sup@corp.io", SUPERVISOR)).unwrap();
        let sup = "sup@corp.io";
        assert!(matches!(auth.add_role(sup, new_role("X")), Err(RbacError::Forbidden(_))));
        assert!(matches!(auth.add_route(sup, new_route("/x", &[ANALYST])), Err(RbacError::Forbidden(_))));
        assert!(matches!(auth.users(sup), Err(RbacError::Forbidden(_))));
        assert!(matches!(auth.users("nobody@corp.io"), Err(RbacError::Forbidden(_))));
    }

    #[test]
    fn disabled_admin_loses_rights() {
        let (_dir, auth) = setup();
        auth.add_user(ROOT, new_user("ops@corp.io", ADMIN)).unwrap();
        auth.add_role("ops@corp.io", new_role("OPS")).unwrap();
        auth.patch_user(ROOT, "ops@corp.io", UserPatch { is_enabled: Some(false), ..UserPatch::default() }).unwrap();
        assert!(matches!(auth.add_role("ops@corp.io", new_role("OPS2")), Err(RbacError::Forbidden(_))));
    }

    #[test]
    fn create_and_lookup_user() {
        let (_dir, auth) = setup();
        let u = auth.add_user(ROOT, new_user(" Ana@Corp.io ", "analyst")).unwrap();
        assert_eq!(u.email, "ana@corp.io");
        assert_eq!(u.role, ANALYST);
        assert_eq!(u.user_id, "user-2");
        assert!(u.is_enabled);
        assert_eq!(auth.user("ANA@corp.io").unwrap(), u);
        assert!(matches!(auth.add_user(ROOT, new_user("ana@corp.io", ANALYST)), Err(RbacError::DuplicateEntity(_))));
        assert!(matches!(auth.add_user(ROOT, new_user("not-an-email", ANALYST)), Err(RbacError::Invalid(_))));
        assert_eq!(auth.users(ROOT).unwrap().len(), 2);
    }

    #[test]
    fn default_admin_is_protected() {
        let (_dir, auth) = setup();
        assert!(matches!(auth.remove_user(ROOT, ROOT), Err(RbacError::ProtectedEntity(_))));
        let demote = UserPatch { role: Some(ANALYST.into()), ..UserPatch::default() };
        assert!(matches!(auth.patch_user(ROOT, ROOT, demote), Err(RbacError::ProtectedEntity(_))));
        let disable = UserPatch { is_enabled: Some(false), ..UserPatch::default() };
        assert!(matches!(auth.patch_user(ROOT, ROOT, disable), Err(RbacError::ProtectedEntity(_))));
        let rename = UserPatch { display_name: Some("Root".into()), ..UserPatch::default() };
        assert_eq!(auth.patch_user(ROOT, ROOT, rename).unwrap().display_name, "Root");
    }

    #[test]
    fn routes_for_user() {
        let (_dir, auth) = setup();
        auth.add_user(ROOT, new_user("ana@corp.io", ANALYST)).unwrap();
        let r = auth.routes_for("ana@corp.io").unwrap();
        assert_eq!(r.role, ANALYST);
        assert!(r.routes.iter().any(|p| p.route == "/dashboard"));
        assert!(!r.routes.iter().any(|p| p.route == "/evaluations"));

        assert!(auth.check("ana@corp.io", "/settings").unwrap());
        assert!(!auth.check("ana@corp.io", "/admin/users").unwrap());
        assert!(matches!(auth.routes_for("ghost@corp.io"), Err(RbacError::NotFound(_))));
    }

    #[test]
    fn disabled_user_has_no_routes() {
        let (_dir, auth) = setup();
        auth.add_user(ROOT, new_user("ana@corp.io", ANALYST)).unwrap();
        auth.patch_user(ROOT, "ana@corp.io", UserPatch { is_enabled: Some(false), ..UserPatch::default() }).unwrap();
        assert!(matches!(auth.routes_for("ana@corp.io"), Err(RbacError::AccountDisabled(_))));
        assert!(!auth.check("ana@corp.io", "/dashboard").unwrap());
        assert!(!auth.user("ana@corp.io").unwrap().is_enabled);
    }
}

// ============================================================================
// Trait surface
// ============================================================================

mod trait_tests {
    use super::*;

    #[tokio::test]
    async fn trait_delegates_to_tables() {
        let (_dir, auth) = setup();
        let auth: &dyn PermissionAuthority = &auth;
        auth.create_role(ROOT, new_role("MANAGER")).await.unwrap();
        let route = auth.create_route(ROOT, new_route("/reports/custom", &["MANAGER"])).await.unwrap();
        auth.create_user(ROOT, new_user("m@corp.io", "MANAGER")).await.unwrap();

        assert!(auth.check_permission("m@corp.io", "/reports/custom").await.unwrap());
        let listed = auth.accessible_routes("m@corp.io").await.unwrap();
        assert_eq!(listed.routes.len(), 1);

        auth.update_route(ROOT, &route.id, RoutePatch::enabled(false)).await.unwrap();
        assert!(!auth.check_permission("m@corp.io", "/reports/custom").await.unwrap());

        auth.delete_route(ROOT, &route.id).await.unwrap();
        auth.delete_user(ROOT, "m@corp.io").await.unwrap();
        auth.delete_role(ROOT, "MANAGER").await.unwrap();
        assert_eq!(auth.list_roles().await.unwrap().len(), 3);
        assert_eq!(auth.list_routes().await.unwrap().len(), 14);
        assert!(matches!(auth.verify_user("m@corp.io").await, Err(RbacError::NotFound(_))));
    }
}
