//! Tavily web search.
//!
//! `POST /search` with the key in the JSON body.

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{Endpoint, SearchClient};
use crate::core::http::{build_client, send_with_retry};
use crate::core::models::{SearchHit, SearchOptions};
use crate::core::provider::SearchProvider;
use crate::error::Result;

/// Public API base.
pub const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

const PROVIDER: &str = "Tavily";

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
    content: Option<String>,
}

/// Tavily client.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    http: Client,
    api_key: String,
    endpoint: Endpoint,
}

impl TavilyClient {
    /// Client against the public API.
    ///
    /// # Errors
    ///
    /// `MissingCredential` for an empty key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(
            api_key,
            Endpoint::new(DEFAULT_BASE_URL, SearchProvider::Tavily.default_timeout()),
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
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "search_depth": "basic",
            "include_answer": false,
            "include_raw_content": false,
            "max_results": options.max_results,
        });

        let response: SearchResponse =
            send_with_retry(PROVIDER, &self.endpoint.retry, self.endpoint.timeout, || {
                self.http.post(&url).json(&body)
            })
            .await?;

        Ok(response
            .results
            .into_iter()
            .zip(1..)
            .map(|(r, rank)| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.content.unwrap_or_default(),
                rank,
            })
            .collect())
    }
}

impl SearchClient for TavilyClient {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Tavily
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        options: &'a SearchOptions,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        self.run(query, options).boxed()
    }
}
