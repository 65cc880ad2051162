//! Exa web search.
//!
//! `POST /search {query, numResults}` with `x-api-key`. Results may arrive
//! under `results` or `documents`; a missing title falls back to the URL.

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
pub const DEFAULT_BASE_URL: &str = "https://api.exa.ai";

const PROVIDER: &str = "Exa";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Option<Vec<WireResult>>,
    documents: Option<Vec<WireResult>>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    title: Option<String>,
    #[serde(default)]
    url: String,
    text: Option<String>,
    snippet: Option<String>,
}

impl WireResult {
    fn into_hit(self, rank: u32) -> SearchHit {
        let title = self
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.url.clone());
        let snippet = self
            .text
            .filter(|t| !t.is_empty())
            .or(self.snippet)
            .unwrap_or_default();
        SearchHit {
            title,
            url: self.url,
            snippet,
            rank,
        }
    }
}

/// Exa search client.
#[derive(Debug, Clone)]
pub struct ExaClient {
    http: Client,
    api_key: String,
    endpoint: Endpoint,
}

impl ExaClient {
    /// Client against the public API.
    ///
    /// # Errors
    ///
    /// `MissingCredential` for an empty key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(
            api_key,
            Endpoint::new(DEFAULT_BASE_URL, SearchProvider::Exa.default_timeout()),
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
            "query": query,
            "numResults": options.max_results,
        });

        let response: SearchResponse =
            send_with_retry(PROVIDER, &self.endpoint.retry, self.endpoint.timeout, || {
                self.http
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .json(&body)
            })
            .await?;

        Ok(hits(response))
    }
}

fn hits(response: SearchResponse) -> Vec<SearchHit> {
    response
        .results
        .or(response.documents)
        .unwrap_or_default()
        .into_iter()
        .zip(1..)
        .map(|(r, rank)| r.into_hit(rank))
        .collect()
}

impl SearchClient for ExaClient {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Exa
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        options: &'a SearchOptions,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        self.run(query, options).boxed()
    }
}
