//! Multi-provider search comparison.
//!
//! One query goes to every requested search provider at once. Results are
//! merged into rows keyed by normalized URL so the same page can be compared
//! across providers by rank.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use url::Url;

use super::models::{SearchComparison, SearchHit, SearchOptions, SearchResultRow};
use super::provider::SearchProvider;
use crate::providers::SearchClient;

/// Canonical merge key for a URL.
///
/// Lower-cases the host, strips leading `www.` labels, trailing slashes on the
/// path, the fragment and the port. The query string is kept. Input that
/// does not parse as an absolute URL is lower-cased with its fragment and
/// trailing slashes removed. Applying it twice gives the same result.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(url) = Url::parse(raw)
        && let Some(host) = url.host_str()
    {
        let host = host.to_lowercase();
        let host = host.trim_start_matches("www.");
        if host.is_empty() {
            return fallback_key(raw);
        }
        let path = url.path().trim_end_matches('/');
        let query = url.query().map(|q| format!("?{q}")).unwrap_or_default();
        return format!("{}://{host}{path}{query}", url.scheme());
    }

    fallback_key(raw)
}

fn fallback_key(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let without_fragment = lowered.split('#').next().unwrap_or_default();
    without_fragment.trim_end_matches('/').to_string()
}

/// Runs search comparisons over a set of configured clients.
#[derive(Clone, Default)]
pub struct SearchComparator {
    clients: HashMap<SearchProvider, Arc<dyn SearchClient>>,
}

impl std::fmt::Debug for SearchComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchComparator")
            .field("providers", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SearchComparator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client; providers without one are reported as unconfigured.
    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn SearchClient>) -> Self {
        self.clients.insert(client.provider(), client);
        self
    }

    /// Providers with a registered client.
    #[must_use]
    pub fn configured(&self) -> Vec<SearchProvider> {
        let mut providers: Vec<_> = self.clients.keys().copied().collect();
        providers.sort();
        providers
    }

    /// Search every requested provider and merge the results.
    ///
    /// Never fails: unknown names and missing credentials become warnings,
    /// provider errors are logged and count as empty results.
    pub async fn compare<S: AsRef<str>>(
        &self,
        query: &str,
        provider_names: &[S],
        options: &SearchOptions,
    ) -> SearchComparison {
        let mut warnings = Vec::new();
        let mut requested = Vec::new();

        for name in provider_names {
            let name = name.as_ref();
            match SearchProvider::from_cli_name(name) {
                Ok(provider) if !requested.contains(&provider) => requested.push(provider),
                Ok(_) => {}
                Err(_) => warnings.push(format!("Unknown search provider: {name}")),
            }
        }
        requested.sort();

        let mut runnable = Vec::new();
        for provider in &requested {
            match self.clients.get(provider) {
                Some(client) => runnable.push(Arc::clone(client)),
                None => warnings.push(format!("{} API key not configured", provider.display_name())),
            }
        }

        tracing::info!(
            query_len = query.len(),
            providers = runnable.len(),
            warnings = warnings.len(),
            "Starting search comparison"
        );

        let searches = runnable.iter().map(|client| async move {
            let provider = client.provider();
            match client.search(query, options).await {
                Ok(hits) => {
                    tracing::debug!(provider = %provider, hits = hits.len(), "Search finished");
                    (provider, hits)
                }
                Err(err) => {
                    tracing::warn!(provider = %provider, error = %err, "Search failed");
                    (provider, Vec::new())
                }
            }
        });
        let results = join_all(searches).await;

        SearchComparison {
            rows: merge(&requested, results),
            warnings,
        }
    }
}

/// Merge per-provider hits into rows, in provider merge order.
///
/// The first provider to report a URL sets its title and snippet; later
/// providers add their rank and fill a title or snippet left empty.
#[must_use]
pub fn merge(
    requested: &[SearchProvider],
    mut results: Vec<(SearchProvider, Vec<SearchHit>)>,
) -> Vec<SearchResultRow> {
    results.sort_by_key(|(provider, _)| *provider);

    let empty_ranks: BTreeMap<SearchProvider, Option<u32>> =
        requested.iter().map(|p| (*p, None)).collect();
    let mut rows: Vec<SearchResultRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (provider, hits) in results {
        for hit in hits {
            if hit.url.trim().is_empty() {
                continue;
            }
            let key = normalize_url(&hit.url);
            let position = *index.entry(key.clone()).or_insert_with(|| {
                rows.push(SearchResultRow {
                    normalized_url: key,
                    url: hit.url.clone(),
                    title: hit.title.clone(),
                    snippet: hit.snippet.clone(),
                    ranks: empty_ranks.clone(),
                });
                rows.len() - 1
            });

            let row = &mut rows[position];
            let rank = row.ranks.entry(provider).or_insert(None);
            if rank.is_none() {
                *rank = Some(hit.rank);
            }
            if row.title.is_empty() {
                row.title = hit.title;
            }
            if row.snippet.is_empty() {
                row.snippet = hit.snippet;
            }
        }
    }

    rows
}
