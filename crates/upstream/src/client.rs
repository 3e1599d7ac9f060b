use std::time::Duration;

use offerank_core::config::UpstreamConfig;
use offerank_core::UpstreamError;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

pub(crate) const ACCEPT_JSON: &str = "application/json, text/plain, */*";
pub(crate) const CATALOG_LANGUAGE: &str = "uk";

/// Shared client for every upstream call, bounded by the configured timeout.
pub fn build_client(config: &UpstreamConfig) -> Result<Client, UpstreamError> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(transport)
}

pub(crate) fn transport(error: reqwest::Error) -> UpstreamError {
    UpstreamError::Transport(error.to_string())
}

pub(crate) fn status(response: &Response) -> UpstreamError {
    UpstreamError::Status { status: response.status().as_u16(), url: response.url().to_string() }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, UpstreamError> {
    response.json::<T>().await.map_err(|error| UpstreamError::Decode(error.to_string()))
}
