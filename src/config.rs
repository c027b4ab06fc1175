//! Configuration
//!
//! Defaults, overridden by a TOML file and then by `ROUTEGATE_*` environment
//! variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{CALLBACK_ROUTE, LANDING_ROUTE, LOGIN_ROUTE, UNAUTHORIZED_ROUTE};
use crate::error::{err, RbacError, Result};

/// Navigation endpoints used by the session resolver and the route guard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub login_route: String,
    /// Where an authenticated user lands when visiting the login route.
    pub landing_route: String,
    pub unauthorized_route: String,
    /// Reachable without a session; includes the login route.
    pub public_routes: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_route: LOGIN_ROUTE.to_string(),
            landing_route: LANDING_ROUTE.to_string(),
            unauthorized_route: UNAUTHORIZED_ROUTE.to_string(),
            public_routes: vec![LOGIN_ROUTE.to_string(), CALLBACK_ROUTE.to_string()],
        }
    }
}

impl GuardConfig {
    /// Exact match or a segment-aligned prefix of a public route.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_routes.iter().any(|p| {
            path == p || path.strip_prefix(p.as_str()).map_or(false, |rest| rest.starts_with('/'))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the remote permission authority.
    pub authority_url: String,
    pub data_dir: PathBuf,
    /// Listen address for `routegate-server`.
    pub bind: String,
    pub request_timeout_secs: u64,
    pub guard: GuardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authority_url: "http://127.0.0.1:3000".to_string(),
            data_dir: PathBuf::from("./data"),
            bind: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 10,
            guard: GuardConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RbacError::Invalid(format!("Invalid config: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path.as_ref()).map_err(err)?;
        Self::from_toml_str(&s)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|k| std::env::var(k).ok())
    }

    fn with_vars<F: Fn(&str) -> Option<String>>(mut self, var: F) -> Result<Self> {
        if let Some(v) = var("ROUTEGATE_AUTHORITY_URL") {
            self.authority_url = v;
        }
        if let Some(v) = var("ROUTEGATE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("ROUTEGATE_BIND") {
            self.bind = v;
        }
        if let Some(v) = var("ROUTEGATE_TIMEOUT_SECS") {
            self.request_timeout_secs = v
                .parse()
                .map_err(|_| RbacError::Invalid(format!("ROUTEGATE_TIMEOUT_SECS must be a number, got '{}'", v)))?;
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// LMDB directory of the local permission authority.
    pub fn authority_dir(&self) -> PathBuf {
        self.data_dir.join("authority")
    }

    /// LMDB directory of the local cache and session store.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }
}
