//! Feedback service entry-point: loads settings, migrates the schema, and
//! runs the HTTP server alongside the consistency worker.

mod server;

use actix_web::web;
use color_eyre::eyre::{Context, Result, eyre};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use feedback_service::inbound::http::health::HealthState;
use feedback_service::outbound::persistence::{DbPool, run_pending_migrations};
use server::{FeedbackServiceSettings, ServerConfig, build_components, create_server, spawn_worker};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = FeedbackServiceSettings::load_from_iter(std::env::args_os())
        .map_err(|e| eyre!("failed to load feedback service settings: {e}"))?;
    let pool_config = settings.pool_config()?;
    let config = ServerConfig::from_settings(&settings)?;

    let database_url = pool_config.database_url().to_owned();
    let applied = tokio::task::spawn_blocking(move || run_pending_migrations(&database_url))
        .await
        .wrap_err("migration task panicked")??;
    info!(applied, "database migrations complete");

    let pool = DbPool::new(pool_config)
        .await
        .wrap_err("failed to create database pool")?;
    let components = build_components(&config, pool)?;

    let worker = components.worker.map(spawn_worker);
    if worker.is_none() {
        info!("consistency worker disabled");
    }

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state.clone(), components.http_state, config)?;
    let served = server.await;

    health_state.mark_unhealthy();
    if let Some(handle) = worker {
        handle.stop().await;
    }
    served.wrap_err("HTTP server failed")
}
