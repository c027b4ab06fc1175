//! HTTP request and response bodies shared by the server and the HTTP client

use serde::{Deserialize, Serialize};

use crate::model::UserRecord;

/// Mutation body: the payload's fields plus `requesterEmail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithRequester<T> {
    pub requester_email: String,
    #[serde(flatten)]
    pub body: T,
}

/// Body of deletes and query of `GET /users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
    pub requester_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailBody {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckBody {
    pub email: String,
    pub route: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub user: UserRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
}
