//! Routegate HTTP Server
//!
//! JSON surface of a [`LocalAuthority`]. `HttpAuthority` is
//! the matching client.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::backend::LocalAuthority;
use crate::error::RbacError;
use crate::model::{
    AccessibleRoutes, NewRole, NewRoute, NewUser, RoleDefinition, RoutePatch, RoutePermission, UserPatch, UserRecord,
};
use crate::wire::{
    Ack, CheckBody, CheckResponse, EmailBody, ErrorBody, Health, Requester, VerifyResponse, WithRequester,
};

type AppState = Arc<LocalAuthority>;

// ============================================================================
// Errors
// ============================================================================

pub struct ApiError(RbacError);

impl From<RbacError> for ApiError {
    fn from(e: RbacError) -> Self {
        Self(e)
    }
}

pub fn status_of(e: &RbacError) -> StatusCode {
    match e {
        RbacError::DuplicateEntity(_) | RbacError::Invalid(_) => StatusCode::BAD_REQUEST,
        RbacError::Forbidden(_) | RbacError::ProtectedEntity(_) | RbacError::AccountDisabled(_) => {
            StatusCode::FORBIDDEN
        }
        RbacError::NotFound(_) => StatusCode::NOT_FOUND,
        RbacError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RbacError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }
        let body = ErrorBody { error: self.0.message().to_string(), code: Some(self.0.code().to_string()) };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

const ACK: Ack = Ack { success: true };

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<Health> {
    Json(Health { status: "ok".to_string(), version: env!("CARGO_PKG_VERSION").to_string() })
}

// Roles

async fn list_roles(State(auth): State<AppState>) -> ApiResult<Vec<RoleDefinition>> {
    Ok(Json(auth.roles()?))
}

async fn create_role(
    State(auth): State<AppState>,
    Json(req): Json<WithRequester<NewRole>>,
) -> Result<(StatusCode, Json<RoleDefinition>), ApiError> {
    let role = auth.add_role(&req.requester_email, req.body)?;
    Ok((StatusCode::CREATED, Json(role)))
}

async fn delete_role(
    State(auth): State<AppState>,
    Path(role_id): Path<String>,
    Json(req): Json<Requester>,
) -> ApiResult<Ack> {
    auth.remove_role(&req.requester_email, &role_id)?;
    Ok(Json(ACK))
}

// Routes

async fn list_routes(State(auth): State<AppState>) -> ApiResult<Vec<RoutePermission>> {
    Ok(Json(auth.routes()?))
}

async fn create_route(
    State(auth): State<AppState>,
    Json(req): Json<WithRequester<NewRoute>>,
) -> Result<(StatusCode, Json<RoutePermission>), ApiError> {
    let route = auth.add_route(&req.requester_email, req.body)?;
    Ok((StatusCode::CREATED, Json(route)))
}

async fn update_route(
    State(auth): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<WithRequester<RoutePatch>>,
) -> ApiResult<RoutePermission> {
    Ok(Json(auth.patch_route(&req.requester_email, &id, req.body)?))
}

async fn delete_route(
    State(auth): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<Requester>,
) -> ApiResult<Ack> {
    auth.remove_route(&req.requester_email, &id)?;
    Ok(Json(ACK))
}

// Users

async fn list_users(State(auth): State<AppState>, Query(req): Query<Requester>) -> ApiResult<Vec<UserRecord>> {
    Ok(Json(auth.users(&req.requester_email)?))
}

async fn create_user(
    State(auth): State<AppState>,
    Json(req): Json<WithRequester<NewUser>>,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    let user = auth.add_user(&req.requester_email, req.body)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(auth): State<AppState>,
    Path(email): Path<String>,
    Json(req): Json<WithRequester<UserPatch>>,
) -> ApiResult<UserRecord> {
    Ok(Json(auth.patch_user(&req.requester_email, &email, req.body)?))
}

async fn delete_user(
    State(auth): State<AppState>,
    Path(email): Path<String>,
    Json(req): Json<Requester>,
) -> ApiResult<Ack> {
    auth.remove_user(&req.requester_email, &email)?;
    Ok(Json(ACK))
}

// Auth

async fn verify(State(auth): State<AppState>, Json(req): Json<EmailBody>) -> ApiResult<VerifyResponse> {
    Ok(Json(VerifyResponse { user: auth.user(&req.email)? }))
}

async fn accessible_routes(State(auth): State<AppState>, Json(req): Json<EmailBody>) -> ApiResult<AccessibleRoutes> {
    Ok(Json(auth.routes_for(&req.email)?))
}

async fn check_permission(State(auth): State<AppState>, Json(req): Json<CheckBody>) -> ApiResult<CheckResponse> {
    Ok(Json(CheckResponse { allowed: auth.check(&req.email, &req.route)? }))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(authority: Arc<LocalAuthority>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health))
        // Roles
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:role_id", delete(delete_role))
        // Routes
        .route("/routes", get(list_routes).post(create_route))
        .route("/routes/:id", patch(update_route).delete(delete_route))
        // Users
        .route("/users", get(list_users).post(create_user))
        .route("/users/:email", patch(update_user).delete(delete_user))
        // Auth
        .route("/auth/verify", post(verify))
        .route("/auth/accessible-routes", post(accessible_routes))
        .route("/auth/check-permission", post(check_permission))
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(authority)
}
