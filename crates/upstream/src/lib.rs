//! HTTP adapters for the public procurement catalog and the price aggregator.

pub mod catalog;
pub mod client;
pub mod enricher;
pub mod price;

use std::sync::Arc;

use offerank_core::catalog::ports::RandomPacer;
use offerank_core::config::{AppConfig, UpstreamConfig};
use offerank_core::{
    AcquisitionLoop, CandidateStore, ListingService, SuitabilityClassifier, UpstreamError,
};

pub use catalog::{last_parenthesized, product_code, CatalogSource, DEFAULT_MAX_PAGES};
pub use client::build_client;
pub use enricher::CatalogEnricher;
pub use price::PriceLookup;

/// Catalog source and enricher sharing one HTTP client.
pub fn catalog_adapters(
    config: &UpstreamConfig,
) -> Result<(CatalogSource, CatalogEnricher), UpstreamError> {
    let client = build_client(config)?;
    let source = CatalogSource::new(client.clone(), config.catalog_search_url.clone())
        .with_max_pages(config.catalog_max_pages);
    let enricher = CatalogEnricher::new(
        client.clone(),
        config.catalog_product_url.clone(),
        PriceLookup::new(client, config),
    );
    Ok((source, enricher))
}

/// Listing service over the live catalog, caching into `store`.
pub fn listing_service(
    config: &AppConfig,
    store: Arc<dyn CandidateStore>,
) -> Result<ListingService, UpstreamError> {
    let (source, enricher) = catalog_adapters(&config.upstream)?;
    let acquisition = &config.acquisition;
    let pacer = RandomPacer::from_millis(acquisition.pacing_min_ms, acquisition.pacing_max_ms);

    let acquisition_loop =
        AcquisitionLoop::new(Arc::new(source), Arc::new(enricher), store.clone(), Arc::new(pacer))
            .with_classifier(SuitabilityClassifier::new(acquisition.required_share))
            .with_max_attempts(acquisition.max_attempts);

    Ok(ListingService::new(store, acquisition_loop))
}
