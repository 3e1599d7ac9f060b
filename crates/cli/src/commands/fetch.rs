use std::sync::Arc;

use crate::commands::{runtime, CommandResult};
use offerank_core::config::{AppConfig, LoadOptions};
use offerank_core::{ApplicationError, Listing, ListingRequest};
use offerank_db::{connect_from_config, migrations, SqlCandidateRepository};
use offerank_upstream::listing_service;

/// Runs one listing against the configured catalog and cache.
pub fn run(query: &str, limit: Option<u32>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "fetch",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let limit = limit.map(|limit| limit.to_string());
    let request = match ListingRequest::parse(
        Some(query),
        limit.as_deref(),
        config.acquisition.default_listing_limit,
    ) {
        Ok(request) => request,
        Err(error) => return CommandResult::failure("fetch", "validation", error.to_string(), 6),
    };

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "fetch",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let store = Arc::new(SqlCandidateRepository::new(pool.clone()));
        let listing: Result<Listing, (&'static str, String, u8)> =
            match listing_service(&config, store) {
                Ok(service) => service.list(&request).await.map_err(classify),
                Err(error) => Err(("upstream_setup", error.to_string(), 7u8)),
            };
        pool.close().await;
        listing
    });

    let listing = match result {
        Ok(listing) => listing,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("fetch", error_class, message, exit_code);
        }
    };

    match serde_json::to_value(&listing) {
        Ok(data) => CommandResult::success_with_data(
            "fetch",
            format!("listed {} of {} requested candidates", listing.count, request.limit()),
            Some(data),
        ),
        Err(error) => CommandResult::failure("fetch", "serialization", error.to_string(), 1),
    }
}

fn classify(error: ApplicationError) -> (&'static str, String, u8) {
    match error {
        ApplicationError::UpstreamUnavailable(message) => ("upstream", message, 7),
        ApplicationError::Persistence(message) => ("persistence", message, 4),
        other => ("listing", other.to_string(), 1),
    }
}
