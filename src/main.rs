use anyhow::Context;

mod ads;
mod app;
mod config;
mod error;
mod state;
mod storage;
#[cfg(test)]
mod testing;
mod users;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        eprintln!("no .env file found, using process environment");
    }

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "classifieds=debug,axum=info,tower_http=info".to_string());
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

    let config = AppConfig::from_env().context("load configuration")?;
    let (host, port) = (config.host.clone(), config.port);

    let (app_state, db) = AppState::init(config).await?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("apply database schema")?;

    let result = app::serve(app::build_app(app_state), &host, port).await;

    db.close().await;
    tracing::info!("database pool closed");
    result
}
