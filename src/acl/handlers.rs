use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    acl::{
        dto::{CheckResponse, UpsertUserRequest},
        permissions::Permissions,
        repo_types::UserRecord,
        services::{AclEvaluator, Capability, Decision},
    },
    identity::extractors::Caller,
    state::AppState,
};

pub fn acl_routes() -> Router<AppState> {
    Router::new()
        .route("/acl/me", get(my_permissions))
        .route("/acl/check/:capability", get(check_capability))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).put(upsert_user))
        .route("/admin/users/:email", delete(delete_user))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, caller), fields(caller = %caller.email()))]
pub async fn my_permissions(State(state): State<AppState>, caller: Caller) -> Json<Permissions> {
    let acl = state.evaluator_for(&caller.identity);
    Json(Permissions::resolve(&acl, caller.email()).await)
}

#[instrument(skip(state, caller), fields(caller = %caller.email()))]
pub async fn check_capability(
    State(state): State<AppState>,
    caller: Caller,
    Path(capability): Path<String>,
) -> Json<CheckResponse> {
    let acl = state.evaluator_for(&caller.identity);
    let capability = Capability::parse(&capability);
    let decision = acl.check(caller.email(), &capability).await;
    Json(CheckResponse {
        capability: capability.to_string(),
        decision: decision.label(),
        reason: decision.reason(),
    })
}

/// Admin API gate: the caller must be both allowed in and an administrator,
/// so a blocked admin row cannot manage users.
async fn require_admin(acl: &AclEvaluator, caller: &Caller) -> Result<(), (StatusCode, String)> {
    let decision = match acl.check_allowed(caller.email()).await {
        Decision::Granted => acl.check_admin(caller.email()).await,
        refused => refused,
    };
    match decision {
        Decision::Granted => Ok(()),
        Decision::Denied(reason) => {
            warn!(caller = %caller.email(), %reason, "admin route refused");
            Err((StatusCode::FORBIDDEN, "Administrator access required".into()))
        }
        Decision::Failed(_) => Err((
            StatusCode::BAD_GATEWAY,
            "Access control is unavailable".into(),
        )),
    }
}

#[instrument(skip(state, caller), fields(caller = %caller.email()))]
pub async fn list_users(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<UserRecord>>, (StatusCode, String)> {
    let acl = state.evaluator_for(&caller.identity);
    require_admin(&acl, &caller).await?;

    UserRecord::list(state.store.as_ref(), Some(&caller.identity))
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "list users failed");
            (StatusCode::BAD_GATEWAY, e.to_string())
        })
}

#[instrument(skip(state, caller, payload), fields(caller = %caller.email()))]
pub async fn upsert_user(
    State(state): State<AppState>,
    caller: Caller,
    Json(mut payload): Json<UpsertUserRequest>,
) -> Result<Json<UserRecord>, (StatusCode, String)> {
    let acl = state.evaluator_for(&caller.identity);
    require_admin(&acl, &caller).await?;

    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let store = state.store.as_ref();
    let existing = UserRecord::find_by_email(store, &payload.email, Some(&caller.identity))
        .await
        .map_err(|e| {
            error!(error = %e, "lookup before upsert failed");
            (StatusCode::BAD_GATEWAY, e.to_string())
        })?;

    let mut rec = UserRecord::new(&payload.email);
    rec.full_name = payload.full_name;
    rec.hub_id = payload.hub_id;
    rec.admin = payload.admin;
    rec.modules = payload.modules;
    rec.status = payload.status.unwrap_or_default();
    match existing {
        Some(prev) => {
            rec.created_at = prev.created_at;
            rec.created_by = prev.created_by;
        }
        None => {
            rec.created_at = Some(OffsetDateTime::now_utc());
            rec.created_by = Some(caller.email().to_string());
        }
    }

    rec.save(state.store.as_ref(), Some(&caller.identity))
        .await
        .map_err(|e| {
            error!(error = %e, "upsert user failed");
            (StatusCode::BAD_GATEWAY, e.to_string())
        })?;

    info!(email = %rec.email, admin = rec.admin, status = %rec.status, "user saved");
    Ok(Json(rec))
}

#[instrument(skip(state, caller), fields(caller = %caller.email()))]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(email): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let acl = state.evaluator_for(&caller.identity);
    require_admin(&acl, &caller).await?;

    UserRecord::delete_by_email(state.store.as_ref(), &email, Some(&caller.identity))
        .await
        .map_err(|e| {
            error!(error = %e, "delete user failed");
            (StatusCode::BAD_GATEWAY, e.to_string())
        })?;
    info!(%email, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod handler_tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::acl::services::evaluator_tests::store_with;
    use crate::identity::{IdentityAssertion, Profile, IDENTITY_HEADER};

    fn header_for(email: &str) -> String {
        let a = IdentityAssertion::from_profile(&Profile::new(email)).unwrap();
        serde_json::to_string(&a).unwrap()
    }

    async fn app() -> (Router, Arc<crate::rowstore::MemoryRowStore>) {
        let store = store_with(vec![
            json!({ "id": "", "email": "boss@acme.com", "admin": true }),
            json!({ "id": "", "email": "crew@acme.com", "modules": { "quality": true } }),
            json!({ "id": "", "email": "exboss@acme.com", "admin": true, "status": "blocked" }),
        ])
        .await;
        let router = Router::new()
            .merge(acl_routes())
            .merge(admin_routes())
            .with_state(AppState::fake(store.clone()));
        (router, store)
    }

    async fn send(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = router.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_as(uri: &str, email: &str) -> Request<Body> {
        Request::get(uri)
            .header(IDENTITY_HEADER, header_for(email))
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@c.com"));
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let (router, _) = app().await;
        let req = Request::get("/acl/me").body(Body::empty()).unwrap();
        let (status, _) = send(router, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_reports_granted_modules() {
        let (router, _) = app().await;
        let (status, body) = send(router, get_as("/acl/me", "crew@acme.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], true);
        assert_eq!(body["admin"], false);
        assert_eq!(body["modules"], json!(["quality"]));
    }

    #[tokio::test]
    async fn check_returns_structured_decision() {
        let (router, _) = app().await;
        let (_, body) = send(router.clone(), get_as("/acl/check/quality", "crew@acme.com")).await;
        assert_eq!(body["decision"], "granted");
        let (_, body) = send(router.clone(), get_as("/acl/check/design", "crew@acme.com")).await;
        assert_eq!(body["decision"], "denied");
        assert_eq!(body["reason"], "module not granted");
        let (_, body) = send(router, get_as("/acl/check/isAdmin", "crew@acme.com")).await;
        assert_eq!(body["capability"], "isAdmin");
        assert_eq!(body["decision"], "denied");
    }

    #[tokio::test]
    async fn admin_routes_refuse_non_admins() {
        let (router, _) = app().await;
        let (status, _) = send(router, get_as("/admin/users", "crew@acme.com")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn blocked_admin_cannot_manage_users() {
        let (router, store) = app().await;
        let (status, _) = send(router.clone(), get_as("/admin/users", "exboss@acme.com")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let req = Request::put("/admin/users")
            .header(IDENTITY_HEADER, header_for("exboss@acme.com"))
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "email": "exboss@acme.com", "admin": true, "status": "active" })
                    .to_string(),
            ))
            .unwrap();
        let (status, _) = send(router.clone(), req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let row = store.fetch("users", "exboss-acme-com").await.unwrap();
        assert_eq!(row["status"], "blocked");

        let req = Request::delete("/admin/users/crew@acme.com")
            .header(IDENTITY_HEADER, header_for("exboss@acme.com"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(router, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(store.fetch("users", "crew-acme-com").await.is_some());
    }

    #[tokio::test]
    async fn admin_can_upsert_list_and_delete() {
        let (router, store) = app().await;

        let req = Request::put("/admin/users")
            .header(IDENTITY_HEADER, header_for("boss@acme.com"))
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "email": " New.Hire@Acme.com ", "modules": { "design": true } })
                    .to_string(),
            ))
            .unwrap();
        let (status, body) = send(router.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "new-hire-acme-com");
        assert_eq!(body["createdBy"], "boss@acme.com");
        assert!(store.fetch("users", "new-hire-acme-com").await.is_some());

        let (status, body) = send(router.clone(), get_as("/admin/users", "boss@acme.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(4));

        for _ in 0..2 {
            let req = Request::delete("/admin/users/new.hire@acme.com")
                .header(IDENTITY_HEADER, header_for("boss@acme.com"))
                .body(Body::empty())
                .unwrap();
            let (status, _) = send(router.clone(), req).await;
            assert_eq!(status, StatusCode::NO_CONTENT);
        }
        assert!(store.fetch("users", "new-hire-acme-com").await.is_none());
    }

    #[tokio::test]
    async fn upsert_keeps_creation_stamp() {
        let (router, store) = app().await;
        let before = store.fetch("users", "crew-acme-com").await.unwrap();
        assert!(before.get("createdBy").is_none());

        let req = Request::put("/admin/users")
            .header(IDENTITY_HEADER, header_for("boss@acme.com"))
            .header("content-type", "application/json")
            .body(Body::from(json!({ "email": "crew@acme.com", "status": "blocked" }).to_string()))
            .unwrap();
        let (status, body) = send(router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "blocked");
        assert!(body.get("createdBy").is_none());
    }

    #[tokio::test]
    async fn upsert_rejects_bad_email() {
        let (router, _) = app().await;
        let req = Request::put("/admin/users")
            .header(IDENTITY_HEADER, header_for("boss@acme.com"))
            .header("content-type", "application/json")
            .body(Body::from(json!({ "email": "nope" }).to_string()))
            .unwrap();
        let (status, _) = send(router, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
