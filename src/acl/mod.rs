use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod permissions;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use permissions::Permissions;
pub use repo_types::{normalize_id, UserRecord, UserStatus};
pub use services::{AclEvaluator, Capability, Decision, DenyReason};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::acl_routes())
        .merge(handlers::admin_routes())
}
