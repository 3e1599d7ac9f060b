use std::sync::Arc;

use axum::Router;
use offerank_core::config::{AppConfig, ConfigError, LoadOptions};
use offerank_core::UpstreamError;
use offerank_db::{connect_from_config, migrations, DbPool, SqlCandidateRepository};
use offerank_upstream::listing_service;
use thiserror::Error;
use tracing::info;

use crate::{api, health};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api: api::ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("upstream client setup failed: {0}")]
    Upstream(#[source] UpstreamError),
}

impl Application {
    pub fn router(&self) -> Router {
        api::router(self.api.clone()).merge(health::router(self.db_pool.clone()))
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    let migration =
        migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        applied = migration.applied.len(),
        schema_version = ?migration.schema_version,
        "database migrations applied"
    );

    let store = Arc::new(SqlCandidateRepository::new(db_pool.clone()));
    let listing = listing_service(&config, store).map_err(BootstrapError::Upstream)?;
    let api = api::ApiState::new(Arc::new(listing), config.acquisition.default_listing_limit);

    Ok(Application { config, db_pool, api })
}
