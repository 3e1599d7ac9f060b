use offerank_core::config::{AppConfig, UpstreamConfig};
use offerank_core::{
    CandidateId, CharacteristicValue, ProductEnricher, ProductSource, RawCandidate, UpstreamError,
};
use offerank_upstream::{build_client, CatalogEnricher, CatalogSource, PriceLookup};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn upstream_config(server: &MockServer) -> UpstreamConfig {
    let mut config = AppConfig::default().upstream;
    config.catalog_search_url = format!("{}/api/search/products", server.uri());
    config.catalog_product_url = format!("{}/api/products", server.uri());
    config.price_search_url = format!("{}/svc/search/api/json-rpc", server.uri());
    config.price_graphql_url = format!("{}/svc/frontend-api/graphql", server.uri());
    config.price_referer_base = "https://prices.example".to_string();
    config.request_timeout_secs = 5;
    config
}

fn enricher(config: &UpstreamConfig) -> CatalogEnricher {
    let client = build_client(config).expect("client");
    CatalogEnricher::new(
        client.clone(),
        config.catalog_product_url.clone(),
        PriceLookup::new(client, config),
    )
}

fn raw(id: &str, identifier: Option<&str>) -> RawCandidate {
    RawCandidate {
        id: CandidateId(id.to_string()),
        identifier: identifier.map(str::to_string),
        title: "power bank (pb100)".to_string(),
    }
}

async fn mount_search_page(server: &MockServer, page: &str, data: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/search/products"))
        .and(query_param("text", "power bank"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
        .mount(server)
        .await;
}

async fn mount_price_chain(server: &MockServer, prices: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/svc/search/api/json-rpc"))
        .and(body_partial_json(json!({ "method": "search.search", "params": { "q": "PB100" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{ "url": "/mobile-power-bank/acme-pb100/" }]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/svc/frontend-api/graphql"))
        .and(body_partial_json(json!({
            "operationName": "urlTypeDefiner",
            "variables": { "path": "/mobile-power-bank/acme-pb100/" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "urlTypeDefiner": { "token": "page-token" } }
        })))
        .mount(server)
        .await;

    let edges: Vec<serde_json::Value> = prices
        .as_array()
        .into_iter()
        .flatten()
        .map(|price| json!({ "node": { "price": price } }))
        .collect();
    Mock::given(method("POST"))
        .and(path("/svc/frontend-api/graphql"))
        .and(header("x-token", "page-token"))
        .and(header("x-referer", "https://prices.example/mobile-power-bank/acme-pb100/"))
        .and(body_partial_json(json!({
            "operationName": "getOffers",
            "variables": { "path": "acme-pb100", "cityId": 187 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "byPathQueryProduct": { "offers": { "edges": edges } } }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn catalog_source_pages_until_empty_and_keeps_coded_titles() {
    let server = MockServer::start().await;
    mount_search_page(
        &server,
        "1",
        json!([
            { "id": "p-1", "title": "Power Bank Acme (black) (PB100)" },
            { "id": "p-2", "title": "Power bank without code" },
            { "id": "p-3", "title": "Power Bank Zeta (ZT-20/1)" }
        ]),
    )
    .await;
    mount_search_page(&server, "2", json!([{ "id": "p-4", "title": "Power Bank Nova (NV5)" }]))
        .await;
    mount_search_page(&server, "3", json!([])).await;

    let config = upstream_config(&server);
    let source =
        CatalogSource::new(build_client(&config).expect("client"), config.catalog_search_url);

    let products = source.fetch("power bank", 10).await.expect("fetch");

    let ids: Vec<&str> = products.iter().map(|product| product.id.0.as_str()).collect();
    assert_eq!(ids, ["p-1", "p-3", "p-4"]);
    assert_eq!(products[0].identifier.as_deref(), Some("PB100"));
    assert_eq!(products[0].title, "power bank acme (black) (pb100)");
    assert_eq!(products[1].identifier.as_deref(), Some("ZT-20/1"));
}

#[tokio::test]
async fn catalog_source_stops_at_limit() {
    let server = MockServer::start().await;
    mount_search_page(
        &server,
        "1",
        json!([
            { "id": "p-1", "title": "Power Bank (PB1)" },
            { "id": "p-2", "title": "Power Bank (PB2)" },
            { "id": "p-3", "title": "Power Bank (PB3)" }
        ]),
    )
    .await;

    let config = upstream_config(&server);
    let source =
        CatalogSource::new(build_client(&config).expect("client"), config.catalog_search_url);

    let products = source.fetch("power bank", 2).await.expect("fetch");

    assert_eq!(products.len(), 2);
}

#[tokio::test]
async fn catalog_source_stops_after_max_pages_of_uncoded_titles() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "p-1", "title": "Power bank without code" }]
        })))
        .expect(3)
        .mount(&server)
        .await;

    let config = upstream_config(&server);
    let source =
        CatalogSource::new(build_client(&config).expect("client"), config.catalog_search_url)
            .with_max_pages(3);

    let products = source.fetch("power bank", 5).await.expect("fetch");

    assert!(products.is_empty());
    server.verify().await;
}

#[tokio::test]
async fn catalog_source_reports_failing_first_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search/products"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = upstream_config(&server);
    let source =
        CatalogSource::new(build_client(&config).expect("client"), config.catalog_search_url);

    let error = source.fetch("power bank", 5).await.expect_err("first page fails");

    assert!(matches!(error, UpstreamError::Status { status: 503, .. }));
}

#[tokio::test]
async fn enricher_combines_characteristics_with_trend_price() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/p-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "requirementResponses": [
                    { "requirement": "Capacity", "value": 20000, "unit": { "name": "mAh" } },
                    { "requirement": "Colour", "value": "black" },
                    { "requirement": "Connector", "values": ["USB-C"], "unit": { "name": "type" } }
                ]
            }
        })))
        .mount(&server)
        .await;
    mount_price_chain(&server, json!([100.0, 200.0, 301.0])).await;

    let config = upstream_config(&server);
    let enrichment =
        enricher(&config).enrich(&raw("p-1", Some("PB100"))).await.expect("enrich").expect("some");

    assert_eq!(enrichment.price, Some(200.33));
    assert_eq!(enrichment.characteristics.len(), 2);
    assert_eq!(enrichment.characteristics[0].requirement, "Capacity");
    assert_eq!(enrichment.characteristics[0].value, Some(CharacteristicValue::Number(20000.0)));
    assert_eq!(
        enrichment.characteristics[1].value,
        Some(CharacteristicValue::Text("USB-C".to_string()))
    );
}

#[tokio::test]
async fn enricher_returns_none_when_product_card_is_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/p-404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = upstream_config(&server);
    let enrichment = enricher(&config).enrich(&raw("p-404", Some("PB100"))).await.expect("enrich");

    assert!(enrichment.is_none());
}

#[tokio::test]
async fn enricher_keeps_candidate_without_price_when_lookup_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/p-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "requirementResponses": [] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/svc/search/api/json-rpc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
        .mount(&server)
        .await;

    let config = upstream_config(&server);
    let enrichment =
        enricher(&config).enrich(&raw("p-2", Some("PB100"))).await.expect("enrich").expect("some");

    assert_eq!(enrichment.price, None);
    assert!(enrichment.characteristics.is_empty());
}

#[tokio::test]
async fn price_lookup_reduces_outlying_offers() {
    let server = MockServer::start().await;
    mount_price_chain(&server, json!([104.0, 100.0, 400.0, 101.0, 102.0, 105.0, 103.0])).await;

    let config = upstream_config(&server);
    let lookup = PriceLookup::new(build_client(&config).expect("client"), &config);

    assert_eq!(lookup.lookup("PB100").await, Some(101.5));
}
