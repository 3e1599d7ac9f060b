use async_trait::async_trait;
use offerank_core::{
    Characteristic, CharacteristicValue, Enrichment, ProductEnricher, RawCandidate, UpstreamError,
};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{decode, transport, ACCEPT_JSON, CATALOG_LANGUAGE};
use crate::price::PriceLookup;

#[derive(Debug, Deserialize)]
struct ProductEnvelope {
    #[serde(default)]
    data: ProductData,
}

#[derive(Debug, Default, Deserialize)]
struct ProductData {
    #[serde(default, rename = "requirementResponses")]
    requirement_responses: Vec<RequirementResponse>,
}

#[derive(Debug, Deserialize)]
struct RequirementResponse {
    requirement: Option<String>,
    value: Option<Value>,
    #[serde(default)]
    values: Vec<Value>,
    unit: Option<Unit>,
}

#[derive(Debug, Deserialize)]
struct Unit {
    name: Option<String>,
}

/// Characteristics from the catalog product card, price from the aggregator.
pub struct CatalogEnricher {
    client: Client,
    product_url: String,
    prices: PriceLookup,
}

impl CatalogEnricher {
    pub fn new(client: Client, product_url: impl Into<String>, prices: PriceLookup) -> Self {
        let product_url = product_url.into().trim_end_matches('/').to_string();
        Self { client, product_url, prices }
    }

    async fn characteristics(
        &self,
        candidate: &RawCandidate,
    ) -> Result<Option<Vec<Characteristic>>, UpstreamError> {
        let url = format!("{}/{}", self.product_url, candidate.id);
        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, ACCEPT_JSON)
            .header(header::ACCEPT_LANGUAGE, CATALOG_LANGUAGE)
            .send()
            .await
            .map_err(transport)?;

        if response.status() != StatusCode::OK {
            warn!(
                event_name = "upstream.enricher.product_unavailable",
                candidate_id = %candidate.id,
                status = response.status().as_u16(),
                "product card request failed"
            );
            return Ok(None);
        }

        let envelope: ProductEnvelope = decode(response).await?;
        Ok(Some(
            envelope.data.requirement_responses.into_iter().filter_map(characteristic).collect(),
        ))
    }
}

/// Only responses measured in a unit are characteristics.
fn characteristic(response: RequirementResponse) -> Option<Characteristic> {
    let unit = response.unit?;
    let requirement = response.requirement?;
    let value = response.value.or_else(|| response.values.into_iter().next());

    Some(Characteristic {
        requirement,
        value: value.and_then(characteristic_value),
        unit: unit.name,
    })
}

fn characteristic_value(value: Value) -> Option<CharacteristicValue> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(CharacteristicValue::Flag(flag)),
        Value::Number(number) => number.as_f64().map(CharacteristicValue::Number),
        Value::String(text) => Some(CharacteristicValue::Text(text)),
        other => Some(CharacteristicValue::Text(other.to_string())),
    }
}

#[async_trait]
impl ProductEnricher for CatalogEnricher {
    async fn enrich(&self, candidate: &RawCandidate) -> Result<Option<Enrichment>, UpstreamError> {
        let Some(characteristics) = self.characteristics(candidate).await? else {
            return Ok(None);
        };
        let price = match candidate.identifier.as_deref() {
            Some(identifier) => self.prices.lookup(identifier).await,
            None => None,
        };

        info!(
            event_name = "upstream.enricher.enriched",
            candidate_id = %candidate.id,
            characteristics = characteristics.len(),
            priced = price.is_some(),
            "candidate enriched"
        );
        Ok(Some(Enrichment { characteristics, price }))
    }
}
