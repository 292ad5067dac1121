//! `web_search` — normalized web search results from a pluggable backend.
//!
//! Only the Brave Search API is wired up. Results can be post-filtered to an
//! allowlist of domains (exact host or subdomain match).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use toolweave_core::error::ToolError;
use toolweave_core::schema::Schema;
use toolweave_core::tool::{Tool, ToolContext, ToolResult, parse_arguments};
use toolweave_security::DomainAllowlist;
use tracing::debug;

use crate::http;

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
const DEFAULT_COUNT: usize = 5;
const DEFAULT_MAX_RESULTS: usize = 8;
const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

/// One normalized search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: String,
}

/// Query parameters forwarded to a backend.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: String,
    pub count: usize,
    pub freshness: Option<String>,
    pub country: Option<String>,
}

/// A web search API.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, ToolError>;
}

/// Brave Search API backend.
pub struct BraveSearch {
    api_key: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl BraveSearch {
    pub fn new(api_key: Option<String>) -> Result<Self, ToolError> {
        Ok(Self {
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            endpoint: BRAVE_ENDPOINT.to_string(),
            client: http::client("web_search")?,
        })
    }

    fn query_params(query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![("q", query.query.clone()), ("count", query.count.to_string())];
        if let Some(f) = query.freshness.as_deref().filter(|f| !f.is_empty()) {
            params.push(("freshness", f.to_string()));
        }
        if let Some(c) = query.country.as_deref().filter(|c| !c.is_empty()) {
            params.push(("country", c.to_uppercase()));
        }
        params
    }
}

#[derive(Debug, Default, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: BraveWeb,
}

#[derive(Debug, Default, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveHit>,
}

#[derive(Debug, Deserialize)]
struct BraveHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

/// Map a Brave response body to normalized results.
fn parse_brave(body: &[u8]) -> Result<Vec<SearchResult>, ToolError> {
    let parsed: BraveResponse =
        serde_json::from_slice(body).map_err(|e| ToolError::failed("web_search", format!("bad Brave response: {e}")))?;
    Ok(parsed
        .web
        .results
        .into_iter()
        .map(|hit| SearchResult {
            title: hit.title,
            url: hit.url,
            snippet: hit.description,
            source: "brave".into(),
        })
        .collect())
}

#[async_trait]
impl SearchBackend for BraveSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, ToolError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(ToolError::failed(
                "web_search",
                "missing Brave API key (set tools.brave_api_key or BRAVE_SEARCH_API_KEY)",
            ));
        };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&Self::query_params(query))
            .header("Accept", "application/json")
            .header("X-Subscription-Token", key)
            .send()
            .await
            .map_err(|e| ToolError::failed("web_search", e))?;

        let status = response.status();
        let body = http::read_limited(response, MAX_RESPONSE_BYTES)
            .await
            .map_err(|e| ToolError::failed("web_search", e))?;
        if !status.is_success() {
            return Err(ToolError::failed(
                "web_search",
                format!("brave search http {}: {}", status.as_u16(), String::from_utf8_lossy(&body)),
            ));
        }
        parse_brave(&body)
    }
}

pub struct WebSearchTool {
    enabled: bool,
    provider_name: String,
    backend: Option<Box<dyn SearchBackend>>,
    domains: DomainAllowlist,
    max_results: usize,
}

impl WebSearchTool {
    /// Build the tool for a named provider. Unknown providers are accepted
    /// here and reported when the tool is used.
    pub fn new(
        enabled: bool,
        provider: &str,
        brave_api_key: Option<String>,
        domains: DomainAllowlist,
        max_results: usize,
    ) -> Result<Self, ToolError> {
        let provider_name = match provider.trim().to_lowercase() {
            p if p.is_empty() => "brave".to_string(),
            p => p,
        };
        let backend: Option<Box<dyn SearchBackend>> = match provider_name.as_str() {
            "brave" => Some(Box::new(BraveSearch::new(brave_api_key)?)),
            _ => None,
        };
        Ok(Self::with_backend(enabled, provider_name, backend, domains, max_results))
    }

    pub fn with_backend(
        enabled: bool,
        provider_name: impl Into<String>,
        backend: Option<Box<dyn SearchBackend>>,
        domains: DomainAllowlist,
        max_results: usize,
    ) -> Self {
        Self {
            enabled,
            provider_name: provider_name.into(),
            backend,
            domains,
            max_results: if max_results == 0 { DEFAULT_MAX_RESULTS } else { max_results },
        }
    }
}

#[derive(Debug, Deserialize)]
struct Input {
    query: String,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    freshness: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    provider: &'a str,
    count: usize,
    results: Vec<SearchResult>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return normalized results. Disabled by default; provider and API key required."
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .required("query", Schema::string("Search query."))
            .property("count", Schema::integer("Number of results (default 5; capped by config)."))
            .property(
                "freshness",
                Schema::string("Optional freshness hint (e.g. 'day', 'week', 'month'). Provider-specific."),
            )
            .property("country", Schema::string("Optional country code (e.g. 'US'). Provider-specific."))
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError> {
        if !self.enabled {
            return Err(ToolError::Disabled { tool_name: self.name().into() });
        }
        let Some(backend) = self.backend.as_deref() else {
            return Err(ToolError::failed(
                self.name(),
                format!("provider '{}' is not supported", self.provider_name),
            ));
        };

        let input: Input = parse_arguments(arguments)?;
        let query = input.query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("missing query".into()));
        }
        let count = input.count.filter(|n| *n > 0).unwrap_or(DEFAULT_COUNT).min(self.max_results);

        let request = SearchQuery {
            query: query.to_string(),
            count,
            freshness: input.freshness,
            country: input.country,
        };
        let results = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ToolError::Cancelled),
            res = backend.search(&request) => res?,
        };

        let total = results.len();
        let results: Vec<SearchResult> = results.into_iter().filter(|r| self.domains.allows_url(&r.url)).collect();
        debug!(provider = %self.provider_name, total, kept = results.len(), "web_search");

        let output = SearchOutput {
            provider: &self.provider_name,
            count: results.len(),
            results,
        };
        let body = serde_json::to_string_pretty(&output).map_err(|e| ToolError::failed(self.name(), e))?;
        Ok(ToolResult::new(body))
    }
}
