use std::sync::Arc;

use hoa_console::auth::admin::AuthorizationAdmin;
use hoa_console::auth::resolver::AuthorizationResolver;
use hoa_console::auth::store::AuthStore;
use hoa_console::backend::{GoTrueClient, PostgrestClient, SupabaseSessions, spawn_token_refresh};
use hoa_console::config::ConsoleConfig;
use hoa_console::{routes, state};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ConsoleConfig::from_env().expect("invalid configuration");
    tracing::info!(backend = ?config.backend, bind = %config.bind_addr, port = config.port, "configuration loaded");

    let gotrue = GoTrueClient::new(&config.backend).expect("auth client build failed");
    let sessions = Arc::new(SupabaseSessions::new(gotrue));
    let postgrest = Arc::new(PostgrestClient::new(&config.backend, sessions.store()).expect("rest client build failed"));

    let auth = Arc::new(AuthStore::start(sessions.clone(), AuthorizationResolver::new(postgrest.clone())));
    let admin = AuthorizationAdmin::new(postgrest);
    let refresh = spawn_token_refresh(sessions, config.refresh_margin_secs);

    let state = state::AppState::new(auth.clone(), admin, config.guard, config.guard_wait);
    let app = routes::app(state, config.cors_origin);
    let listener = tokio::net::TcpListener::bind((config.bind_addr, config.port))
        .await
        .expect("failed to bind");

    tracing::info!(bind = %config.bind_addr, port = config.port, "hoa console listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    refresh.abort();
    auth.shutdown().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
