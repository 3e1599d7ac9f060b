//! Offer price lookup on the price aggregator.
//!
//! Three calls per identifier: a JSON-RPC search resolves the product page,
//! a GraphQL query trades that page for a session token, and a second GraphQL
//! query lists the offers. Offer prices are reduced with
//! [`offerank_core::catalog::pricing::trend_price`].

use offerank_core::catalog::pricing::trend_price;
use offerank_core::config::UpstreamConfig;
use offerank_core::UpstreamError;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::{decode, status, transport};

const TOKEN_QUERY: &str =
    "query urlTypeDefiner($path: String!) { urlTypeDefiner(path: $path) { token } }";
const OFFERS_QUERY: &str = "query getOffers($path: String!, $cityId: Int!) { \
    byPathQueryProduct(path: $path, cityId: $cityId) { \
    offers(first: 1000) { edges { node { price } } } } }";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    #[serde(rename = "urlTypeDefiner")]
    url_type: Option<UrlType>,
}

#[derive(Debug, Deserialize)]
struct UrlType {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OffersData {
    #[serde(rename = "byPathQueryProduct")]
    product: Option<ProductOffers>,
}

#[derive(Debug, Deserialize)]
struct ProductOffers {
    offers: OfferConnection,
}

#[derive(Debug, Deserialize)]
struct OfferConnection {
    #[serde(default)]
    edges: Vec<OfferEdge>,
}

#[derive(Debug, Deserialize)]
struct OfferEdge {
    node: OfferNode,
}

#[derive(Debug, Deserialize)]
struct OfferNode {
    price: Option<f64>,
}

/// Session headers for the offers query.
struct PageSession<'a> {
    token: &'a str,
    referer: String,
}

pub struct PriceLookup {
    client: Client,
    search_url: String,
    graphql_url: String,
    referer_base: String,
    city_id: u32,
}

impl PriceLookup {
    pub fn new(client: Client, config: &UpstreamConfig) -> Self {
        Self {
            client,
            search_url: config.price_search_url.clone(),
            graphql_url: config.price_graphql_url.clone(),
            referer_base: config.price_referer_base.trim_end_matches('/').to_string(),
            city_id: config.price_city_id,
        }
    }

    /// Typical offer price for `identifier`, or `None` when any step fails or
    /// no offer carries a price.
    pub async fn lookup(&self, identifier: &str) -> Option<f64> {
        match self.offer_prices(identifier).await {
            Ok(prices) => {
                let price = trend_price(&prices);
                debug!(
                    event_name = "upstream.price.resolved",
                    identifier,
                    offers = prices.len(),
                    price = ?price,
                    "offer prices reduced"
                );
                price
            }
            Err(error) => {
                warn!(
                    event_name = "upstream.price.unavailable",
                    identifier,
                    error = %error,
                    "price lookup failed"
                );
                None
            }
        }
    }

    async fn offer_prices(&self, identifier: &str) -> Result<Vec<f64>, UpstreamError> {
        let url_path = self.product_path(identifier).await?;
        let token = self.page_token(&url_path).await?;
        self.offers(&url_path, &token).await
    }

    async fn product_path(&self, identifier: &str) -> Result<String, UpstreamError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "search.search",
            "params": { "q": identifier, "lang": "uk", "section_id": null, "entity": "full" },
            "id": 1
        });
        let response: SearchResponse = self.post(&self.search_url, &payload, None).await?;

        response
            .result
            .into_iter()
            .next()
            .and_then(|hit| hit.url)
            .ok_or_else(|| UpstreamError::Decode(format!("no product page for `{identifier}`")))
    }

    async fn page_token(&self, url_path: &str) -> Result<String, UpstreamError> {
        let payload = json!({
            "operationName": "urlTypeDefiner",
            "variables": { "path": url_path },
            "query": TOKEN_QUERY
        });
        let response: GraphqlResponse<TokenData> =
            self.post(&self.graphql_url, &payload, None).await?;

        response
            .data
            .and_then(|data| data.url_type)
            .and_then(|url_type| url_type.token)
            .ok_or_else(|| UpstreamError::Decode(format!("no page token for `{url_path}`")))
    }

    async fn offers(&self, url_path: &str, token: &str) -> Result<Vec<f64>, UpstreamError> {
        let payload = json!({
            "operationName": "getOffers",
            "variables": { "path": product_slug(url_path), "cityId": self.city_id },
            "query": OFFERS_QUERY
        });
        let session = PageSession { token, referer: format!("{}{url_path}", self.referer_base) };
        let response: GraphqlResponse<OffersData> =
            self.post(&self.graphql_url, &payload, Some(&session)).await?;

        let product = response
            .data
            .and_then(|data| data.product)
            .ok_or_else(|| UpstreamError::Decode(format!("no offers for `{url_path}`")))?;
        Ok(product.offers.edges.into_iter().filter_map(|edge| edge.node.price).collect())
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        payload: &Value,
        session: Option<&PageSession<'_>>,
    ) -> Result<T, UpstreamError> {
        let mut request = self
            .client
            .post(url)
            .header(header::ACCEPT, "*/*")
            .header(header::ACCEPT_LANGUAGE, "uk,ru;q=0.9,en;q=0.8")
            .header("x-language", "uk")
            .json(payload);
        if let Some(session) = session {
            request = request
                .header("x-token", session.token)
                .header("x-referer", session.referer.as_str());
        }

        let response = request.send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(status(&response));
        }
        decode(response).await
    }
}

/// Last path segment of a product page, e.g. `/mobile/acme-pb100/` -> `acme-pb100`.
fn product_slug(url_path: &str) -> &str {
    let trimmed = url_path.trim_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
