//! HTTP client for a remote permission authority
//!
//! Speaks the JSON surface served by `server::router`. Transport
//! failures map to `StoreUnavailable`; error responses are decoded back into
//! the matching [`RbacError`] variant from their `code`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use crate::authority::PermissionAuthority;
use crate::config::Config;
use crate::error::{RbacError, Result};
use crate::model::{
    AccessibleRoutes, NewRole, NewRoute, NewUser, RoleDefinition, RoutePatch, RoutePermission, UserPatch, UserRecord,
};
use crate::wire::{Ack, CheckBody, CheckResponse, EmailBody, ErrorBody, Requester, VerifyResponse, WithRequester};

fn unavailable<E: std::error::Error>(e: E) -> RbacError {
    RbacError::StoreUnavailable(e.to_string())
}

#[derive(Clone)]
pub struct HttpAuthority {
    base: Url,
    http: Client,
}

impl HttpAuthority {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| RbacError::Invalid(format!("Invalid authority URL: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(RbacError::Invalid(format!("Invalid authority URL: {}", base_url)));
        }
        let http = Client::builder().timeout(timeout).build().map_err(unavailable)?;
        Ok(Self { base, http })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.authority_url, config.request_timeout())
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| RbacError::Invalid("Authority URL cannot be a base".into()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self.http.request(method, self.url(segments)?))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await.map_err(unavailable)?;
        let status = resp.status();
        if status.is_success() {
            return resp.json::<T>().await.map_err(unavailable);
        }
        let body = resp.json::<ErrorBody>().await.unwrap_or_else(|_| ErrorBody {
            error: format!("Request failed with status {}", status),
            code: None,
        });
        Err(RbacError::from_code(body.code.as_deref().unwrap_or(""), body.error))
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        self.send(self.request(method, segments)?.json(body)).await
    }
}

fn requester_body(email: &str) -> Requester {
    Requester { requester_email: email.to_string() }
}

fn with_requester<T>(email: &str, body: T) -> WithRequester<T> {
    WithRequester { requester_email: email.to_string(), body }
}

#[async_trait]
impl PermissionAuthority for HttpAuthority {
    async fn list_roles(&self) -> Result<Vec<RoleDefinition>> {
        self.send(self.request(Method::GET, &["roles"])?).await
    }

    #[instrument(skip(self, role), fields(role = %role.role_id))]
    async fn create_role(&self, requester: &str, role: NewRole) -> Result<RoleDefinition> {
        self.send_json(Method::POST, &["roles"], &with_requester(requester, role)).await
    }

    #[instrument(skip(self))]
    async fn delete_role(&self, requester: &str, role_id: &str) -> Result<()> {
        let _: Ack = self.send_json(Method::DELETE, &["roles", role_id], &requester_body(requester)).await?;
        Ok(())
    }

    async fn list_routes(&self) -> Result<Vec<RoutePermission>> {
        self.send(self.request(Method::GET, &["routes"])?).await
    }

    #[instrument(skip(self, route), fields(route = %route.route))]
    async fn create_route(&self, requester: &str, route: NewRoute) -> Result<RoutePermission> {
        self.send_json(Method::POST, &["routes"], &with_requester(requester, route)).await
    }

    #[instrument(skip(self, patch))]
    async fn update_route(&self, requester: &str, id: &str, patch: RoutePatch) -> Result<RoutePermission> {
        self.send_json(Method::PATCH, &["routes", id], &with_requester(requester, patch)).await
    }

    #[instrument(skip(self))]
    async fn delete_route(&self, requester: &str, id: &str) -> Result<()> {
        let _: Ack = self.send_json(Method::DELETE, &["routes", id], &requester_body(requester)).await?;
        Ok(())
    }

    async fn list_users(&self, requester: &str) -> Result<Vec<UserRecord>> {
        self.send(self.request(Method::GET, &["users"])?.query(&requester_body(requester))).await
    }

    #[instrument(skip(self, user), fields(user = %user.email))]
    async fn create_user(&self, requester: &str, user: NewUser) -> Result<UserRecord> {
        self.send_json(Method::POST, &["users"], &with_requester(requester, user)).await
    }

    #[instrument(skip(self, patch))]
    async fn update_user(&self, requester: &str, email: &str, patch: UserPatch) -> Result<UserRecord> {
        self.send_json(Method::PATCH, &["users", email], &with_requester(requester, patch)).await
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, requester: &str, email: &str) -> Result<()> {
        let _: Ack = self.send_json(Method::DELETE, &["users", email], &requester_body(requester)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn verify_user(&self, email: &str) -> Result<UserRecord> {
        let r: VerifyResponse =
            self.send_json(Method::POST, &["auth", "verify"], &EmailBody { email: email.to_string() }).await?;
        Ok(r.user)
    }

    #[instrument(skip(self))]
    async fn accessible_routes(&self, email: &str) -> Result<AccessibleRoutes> {
        self.send_json(Method::POST, &["auth", "accessible-routes"], &EmailBody { email: email.to_string() }).await
    }

    async fn check_permission(&self, email: &str, route: &str) -> Result<bool> {
        let body = CheckBody { email: email.to_string(), route: route.to_string() };
        let r: CheckResponse = self.send_json(Method::POST, &["auth", "check-permission"], &body).await?;
        Ok(r.allowed)
    }
}
