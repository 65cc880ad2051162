//! Brave web search.
//!
//! `GET /res/v1/web/search?q=&count=&country=` with `X-Subscription-Token`.

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;

use super::{Endpoint, SearchClient};
use crate::core::http::{build_client, send_with_retry};
use crate::core::models::{SearchHit, SearchOptions};
use crate::core::provider::SearchProvider;
use crate::error::Result;

/// Public API base.
pub const DEFAULT_BASE_URL: &str = "https://api.search.brave.com";

const PROVIDER: &str = "Brave";
const SEARCH_PATH: &str = "/res/v1/web/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<WireResult>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: Option<String>,
}

/// Brave search client.
#[derive(Debug, Clone)]
pub struct BraveClient {
    http: Client,
    api_key: String,
    endpoint: Endpoint,
}

impl BraveClient {
    /// Client against the public API.
    ///
    /// # Errors
    ///
    /// `MissingCredential` for an empty key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(
            api_key,
            Endpoint::new(DEFAULT_BASE_URL, SearchProvider::Brave.default_timeout()),
        )
    }

    /// Client against a custom endpoint.
    ///
    /// # Errors
    ///
    /// `MissingCredential` for an empty key, or client construction failure.
    pub fn with_endpoint(api_key: impl Into<String>, endpoint: Endpoint) -> Result<Self> {
        Ok(Self {
            http: build_client(endpoint.timeout)?,
            api_key: super::require_key(PROVIDER, api_key.into())?,
            endpoint,
        })
    }

    fn query_params(query: &str, options: &SearchOptions) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", query.to_string()),
            ("count", options.max_results.to_string()),
        ];
        if let Some(country) = options.country_filter() {
            params.push(("country", country.to_lowercase()));
        }
        params
    }

    async fn run(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let url = self.endpoint.url(SEARCH_PATH);
        let params = Self::query_params(query, options);

        let response: SearchResponse =
            send_with_retry(PROVIDER, &self.endpoint.retry, self.endpoint.timeout, || {
                self.http
                    .get(&url)
                    .query(&params)
                    .header("X-Subscription-Token", &self.api_key)
                    .header(reqwest::header::ACCEPT, "application/json")
            })
            .await?;

        Ok(response
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .zip(1..)
            .map(|(r, rank)| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.description.unwrap_or_default(),
                rank,
            })
            .collect())
    }
}

impl SearchClient for BraveClient {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Brave
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        options: &'a SearchOptions,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        self.run(query, options).boxed()
    }
}
