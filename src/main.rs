use acc_acl::{app, seed, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "acc_acl=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    // Provision the owner account if configured
    if let Some(owner) = app_state.config.owner.clone() {
        if let Err(e) = seed::ensure_owner(app_state.store.as_ref(), &owner).await {
            tracing::warn!(error = %e, email = %owner.email, "owner seed failed; continuing");
        }
    }

    app::serve(app::build_app(app_state)).await
}
