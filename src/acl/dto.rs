use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::acl::repo_types::UserStatus;

/// Response of `GET /acl/check/:capability`.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub capability: String,
    pub decision: &'static str, // granted, denied or failed
    pub reason: Option<String>,
}

/// Request body for creating or updating a user.
#[derive(Debug, Deserialize)]
pub struct UpsertUserRequest {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub hub_id: Option<String>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub modules: BTreeMap<String, bool>,
    #[serde(default)]
    pub status: Option<UserStatus>,
}
