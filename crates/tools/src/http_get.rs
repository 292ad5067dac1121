//! `http_get` — fetch an allowlisted URL.

use async_trait::async_trait;
use serde::Deserialize;
use toolweave_core::error::ToolError;
use toolweave_core::schema::Schema;
use toolweave_core::tool::{Tool, ToolContext, ToolResult, parse_arguments};
use toolweave_security::{PrefixAllowlist, is_http_url};
use tracing::{debug, warn};

use crate::http;

const DEFAULT_MAX_BYTES: usize = 200_000;

pub struct HttpGetTool {
    enabled: bool,
    allowlist: PrefixAllowlist,
    client: reqwest::Client,
}

impl HttpGetTool {
    pub fn new(enabled: bool, allowlist: PrefixAllowlist) -> Result<Self, ToolError> {
        Ok(Self {
            enabled,
            allowlist,
            client: http::client("http_get")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Input {
    url: String,
    #[serde(default)]
    max_bytes: Option<usize>,
}

#[async_trait]
impl Tool for HttpGetTool {
    fn name(&self) -> &str {
        "http_get"
    }

    fn description(&self) -> &str {
        "Fetch a URL via HTTP GET. Disabled by default; requires allowlisted URL prefixes."
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .required("url", Schema::string("URL to fetch (http/https)."))
            .property("max_bytes", Schema::integer("Maximum bytes to return (default 200000)."))
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError> {
        if !self.enabled {
            return Err(ToolError::Disabled { tool_name: self.name().into() });
        }

        let input: Input = parse_arguments(arguments)?;
        let url = input.url.trim();
        if url.is_empty() {
            return Err(ToolError::InvalidArguments("missing url".into()));
        }
        let max_bytes = input.max_bytes.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_BYTES);

        if !is_http_url(url) {
            return Err(ToolError::InvalidArguments("only http/https URLs are allowed".into()));
        }
        if !self.allowlist.allows(url) {
            warn!(url, "URL blocked by allowlist");
            return Err(ToolError::denied(self.name(), "url is not in allowlist"));
        }

        let fetch = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            let body = http::read_limited(response, max_bytes).await?;
            Ok::<_, reqwest::Error>((status, body))
        };
        let (status, body) = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ToolError::Cancelled),
            res = fetch => res.map_err(|e| ToolError::failed(self.name(), e))?,
        };

        debug!(url, status = status.as_u16(), bytes = body.len(), "http_get");
        let text = String::from_utf8_lossy(&body).into_owned();
        if !status.is_success() {
            return Err(ToolError::failed(self.name(), format!("http {}: {}", status.as_u16(), text)));
        }
        Ok(ToolResult::new(text))
    }
}
