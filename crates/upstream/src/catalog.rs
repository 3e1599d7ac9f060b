//! Paged product search against the procurement catalog.

use std::sync::OnceLock;

use async_trait::async_trait;
use offerank_core::{CandidateId, ProductSource, RawCandidate, UpstreamError};
use regex::Regex;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use crate::client::{decode, status, transport, ACCEPT_JSON, CATALOG_LANGUAGE};

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<String>,
    #[serde(default)]
    title: String,
}

fn product_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\(([A-Za-z0-9/-]+)\)").expect("invalid product code regex")
    })
}

/// Returns the first parenthesized product code in `title`: letters, digits,
/// `-` and `/`, with at least one uppercase letter and one digit.
pub fn product_code(title: &str) -> Option<&str> {
    product_code_pattern()
        .captures_iter(title)
        .filter_map(|captures| captures.get(1))
        .map(|code| code.as_str())
        .find(|code| {
            code.chars().any(|ch| ch.is_ascii_uppercase())
                && code.chars().any(|ch| ch.is_ascii_digit())
        })
}

/// Text between the last `(` and the last `)`, when they are in that order.
pub fn last_parenthesized(title: &str) -> Option<&str> {
    let start = title.rfind('(')?;
    let end = title.rfind(')')?;
    (start < end).then(|| &title[start + 1..end])
}

pub const DEFAULT_MAX_PAGES: u32 = 20;

/// Walks search pages until `limit` titled products are collected, a page
/// comes back empty, the catalog stops answering or `max_pages` pages have
/// been read.
pub struct CatalogSource {
    client: Client,
    search_url: String,
    max_pages: u32,
}

impl CatalogSource {
    pub fn new(client: Client, search_url: impl Into<String>) -> Self {
        Self { client, search_url: search_url.into(), max_pages: DEFAULT_MAX_PAGES }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    async fn fetch_page(&self, query: &str, page: u32) -> Result<Vec<SearchItem>, UpstreamError> {
        let page_number = page.to_string();
        let response = self
            .client
            .post(&self.search_url)
            .query(&[("text", query), ("page", page_number.as_str())])
            .header(header::ACCEPT, ACCEPT_JSON)
            .header(header::ACCEPT_LANGUAGE, CATALOG_LANGUAGE)
            .send()
            .await
            .map_err(transport)?;

        if response.status() != StatusCode::OK {
            return Err(status(&response));
        }
        let page: SearchPage = decode(response).await?;
        Ok(page.data)
    }
}

#[async_trait]
impl ProductSource for CatalogSource {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawCandidate>, UpstreamError> {
        let mut products = Vec::new();
        let mut page = 1;

        while products.len() < limit {
            if page > self.max_pages {
                warn!(
                    event_name = "upstream.catalog.page_cap_reached",
                    query,
                    max_pages = self.max_pages,
                    fetched = products.len(),
                    "catalog page cap reached before the limit"
                );
                break;
            }

            let items = match self.fetch_page(query, page).await {
                Ok(items) => items,
                // A failing first page is a failed fetch; later pages only end it.
                Err(error) if products.is_empty() => return Err(error),
                Err(error) => {
                    warn!(
                        event_name = "upstream.catalog.page_failed",
                        query,
                        page,
                        error = %error,
                        "catalog page request failed; keeping collected products"
                    );
                    break;
                }
            };
            if items.is_empty() {
                break;
            }

            for item in items {
                let Some(id) = item.id else { continue };
                if product_code(&item.title).is_none() {
                    continue;
                }
                products.push(RawCandidate {
                    id: CandidateId(id),
                    identifier: last_parenthesized(&item.title).map(str::to_string),
                    title: item.title.to_lowercase(),
                });
                if products.len() >= limit {
                    break;
                }
            }
            page += 1;
        }

        info!(
            event_name = "upstream.catalog.fetched",
            query,
            limit,
            pages = page,
            fetched = products.len(),
            "catalog search finished"
        );
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::{last_parenthesized, product_code};

    #[test]
    fn product_code_needs_uppercase_and_digit() {
        assert_eq!(product_code("Павербанк Xiaomi (PB100DZM)"), Some("PB100DZM"));
        assert_eq!(product_code("Power bank (black) (A-12/3)"), Some("A-12/3"));
        assert_eq!(product_code("Power bank (black)"), None);
        assert_eq!(product_code("Power bank (20000)"), None);
        assert_eq!(product_code("Power bank (pb-100)"), None);
        assert_eq!(product_code("Power bank (PB 100)"), None);
    }

    #[test]
    fn identifier_is_taken_from_last_parentheses() {
        assert_eq!(last_parenthesized("Power bank (black) (A-12/3)"), Some("A-12/3"));
        assert_eq!(last_parenthesized("Power bank (PB100)"), Some("PB100"));
        assert_eq!(last_parenthesized("Power bank"), None);
        assert_eq!(last_parenthesized("Power bank ) odd ("), None);
    }
}
