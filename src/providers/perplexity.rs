//! Perplexity web search.
//!
//! `POST /search` with bearer auth. The country filter is omitted for
//! worldwide searches.

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Endpoint, SearchClient};
use crate::core::http::{build_client, send_with_retry};
use crate::core::models::{SearchHit, SearchOptions};
use crate::core::provider::SearchProvider;
use crate::error::Result;

/// Public API base.
pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

const PROVIDER: &str = "Perplexity";
const MAX_TOKENS_PER_PAGE: u32 = 256;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
    max_tokens_per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
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
    snippet: Option<String>,
}

/// Perplexity search client.
#[derive(Debug, Clone)]
pub struct PerplexityClient {
    http: Client,
    api_key: String,
    endpoint: Endpoint,
}

impl PerplexityClient {
    /// Client against the public API.
    ///
    /// # Errors
    ///
    /// `MissingCredential` for an empty key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(
            api_key,
            Endpoint::new(DEFAULT_BASE_URL, SearchProvider::Perplexity.default_timeout()),
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

    async fn run(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let url = self.endpoint.url("/search");
        let body = SearchRequest {
            query,
            max_results: options.max_results,
            max_tokens_per_page: MAX_TOKENS_PER_PAGE,
            country: options.country_filter(),
        };

        let response: SearchResponse =
            send_with_retry(PROVIDER, &self.endpoint.retry, self.endpoint.timeout, || {
                self.http
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
            })
            .await?;

        Ok(response
            .results
            .into_iter()
            .zip(1..)
            .map(|(r, rank)| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.snippet.unwrap_or_default(),
                rank,
            })
            .collect())
    }
}

impl SearchClient for PerplexityClient {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Perplexity
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        options: &'a SearchOptions,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        self.run(query, options).boxed()
    }
}
