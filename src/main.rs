mod accounts;
mod api;
mod app;
mod appointments;
mod auth;
mod categories;
mod clients;
mod common;
mod config;
mod error;
mod properties;
mod state;
mod storage;
mod users;

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "nextra=debug,axum=info,tower_http=info".to_string());
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

    let state = state::AppState::init().await?;

    sqlx::migrate!("./migrations")
        .run(&state.db)
        .await
        .context("run database migrations")?;

    state
        .users
        .ensure_default_roles()
        .await
        .context("seed default roles")?;
    if let Some(admin) = &state.config.admin {
        state
            .users
            .ensure_admin(admin)
            .await
            .context("create bootstrap admin")?;
    }

    let app = app::build_app(state);
    app::serve(app).await
}
