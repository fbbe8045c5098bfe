pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod exam;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, state::AppState, telemetry};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let seed_codes = &settings.auth().seed_codes;
    if !seed_codes.is_empty() {
        for code in seed_codes {
            repositories::access_codes::upsert(&db_pool, code, None, true, core::time::now_utc())
                .await?;
        }
        tracing::info!(count = seed_codes.len(), "Seeded access codes");
    }

    if settings.auth().fallback_enabled {
        tracing::warn!("Fallback access code login is enabled");
    }

    let state = AppState::new(settings, db_pool);
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Bacportal API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(core::shutdown::shutdown_signal())
        .await?;

    Ok(())
}
