use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{debug, instrument, warn};

use super::machine::{GuardContext, ModuleGuard};
use super::page::HtmlPage;
use crate::acl::Permissions;
use crate::identity::extractors::Caller;
use crate::state::AppState;

pub fn page_routes() -> Router<AppState> {
    Router::new().route("/pages/:file", get(guarded_page))
}

fn is_safe_page_name(file: &str) -> bool {
    !file.is_empty() && !file.contains("..") && !file.contains(['/', '\\'])
}

#[instrument(skip(state, caller), fields(caller = %caller.email()))]
pub async fn guarded_page(
    State(state): State<AppState>,
    caller: Caller,
    Path(file): Path<String>,
) -> Response {
    if !is_safe_page_name(&file) {
        warn!(%file, "rejected page name");
        return (StatusCode::NOT_FOUND, "page not found").into_response();
    }

    let ctx = GuardContext::new(Some(caller.identity.to_profile()));
    let acl = state.evaluator_for(&caller.identity);
    ctx.acl.set(acl.clone());

    // Permissions are computed alongside the guard; it waits on the slot.
    let slot = ctx.permissions.clone();
    let email = caller.email().to_string();
    tokio::spawn(async move {
        slot.set(Permissions::resolve(&acl, &email).await);
    });

    let guard = ModuleGuard::for_page(&file, ctx, state.config.guard.clone());
    debug!(%file, module = guard.module(), "gating page");
    let mut page = HtmlPage::new(state.config.pages_dir.join(&file));
    let report = guard.run(&mut page).await;
    debug!(module = %report.module, outcome = ?report.outcome, "page verdict");
    page.into_response().await
}

#[cfg(test)]
mod page_route_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::acl::services::evaluator_tests::store_with;
    use crate::identity::{IdentityAssertion, Profile, IDENTITY_HEADER};

    async fn request(file: &str, email: &str) -> (StatusCode, String) {
        let store = store_with(vec![
            json!({ "id": "", "email": "crew@acme.com", "modules": { "quality": true } }),
        ])
        .await;
        static RUN: AtomicUsize = AtomicUsize::new(0);
        let mut state = AppState::fake(store);
        let mut config = (*state.config).clone();
        config.pages_dir = std::env::temp_dir().join(format!(
            "acc-acl-pages-{}-{}",
            std::process::id(),
            RUN.fetch_add(1, Ordering::SeqCst)
        ));
        state.config = Arc::new(config);
        tokio::fs::create_dir_all(&state.config.pages_dir).await.unwrap();
        tokio::fs::write(state.config.pages_dir.join("quality.html"), "<h1>Quality</h1>")
            .await
            .unwrap();

        let identity = IdentityAssertion::from_profile(&Profile::new(email)).unwrap();
        let req = Request::get(format!("/pages/{file}"))
            .header(IDENTITY_HEADER, serde_json::to_string(&identity).unwrap())
            .body(Body::empty())
            .unwrap();
        let res = page_routes().with_state(state).oneshot(req).await.unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[test]
    fn page_names_cannot_escape_pages_dir() {
        assert!(is_safe_page_name("quality.html"));
        assert!(!is_safe_page_name(".."));
        assert!(!is_safe_page_name("..%2Fsecret"));
        assert!(!is_safe_page_name("a\\b.html"));
        assert!(!is_safe_page_name(""));
    }

    #[tokio::test]
    async fn granted_module_serves_page() {
        let (status, body) = request("quality.html", "crew@acme.com").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>Quality</h1>");
    }

    #[tokio::test]
    async fn ungranted_module_renders_denial() {
        let (status, body) = request("design.html", "crew@acme.com").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("You do not have access to the design module."));
    }

    #[tokio::test]
    async fn unknown_user_is_denied() {
        let (status, _) = request("quality.html", "stranger@acme.com").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn emergency_principal_is_let_through() {
        let (status, _) = request("quality.html", "root@acme.com").await;
        assert_eq!(status, StatusCode::OK);
    }
}
