use vidshare::{build_app, serve, AppState};

/// `RUST_LOG` picks the filter; `LOG_FORMAT=json` switches to structured output.
fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "vidshare=debug,axum=info,tower_http=info".to_string());
    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => subscriber.with_target(false).json().init(),
        _ => subscriber.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let state = AppState::init().await.inspect_err(|e| {
        tracing::error!(error = %format!("{e:#}"), "startup failed");
    })?;
    tracing::info!(
        issuer = %state.config.jwt.issuer,
        access_ttl_minutes = state.config.jwt.access_ttl_minutes,
        refresh_ttl_minutes = state.config.jwt.refresh_ttl_minutes,
        "session keys ready"
    );

    serve(build_app(state)).await
}
