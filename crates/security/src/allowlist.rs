//! Allowlist policies for tools that reach outside the repository.
//!
//! Command, script and URL gates are plain prefix lists: the candidate
//! string must start with one of the configured, non-blank prefixes. An
//! empty list denies everything. Search results are filtered by domain.

use url::{Host, Url};

/// Prefix-based gate for command lines, bash scripts and URLs.
#[derive(Debug, Clone, Default)]
pub struct PrefixAllowlist {
    prefixes: Vec<String>,
}

impl PrefixAllowlist {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes = prefixes
            .into_iter()
            .map(|p| p.into().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { prefixes }
    }

    /// Check whether `candidate` starts with a configured prefix.
    pub fn allows(&self, candidate: &str) -> bool {
        self.prefixes.iter().any(|p| candidate.starts_with(p.as_str()))
    }

    /// Check a command plus arguments, joined with single spaces.
    pub fn allows_command(&self, command: &str, args: &[String]) -> bool {
        let mut full = command.to_string();
        for arg in args {
            full.push(' ');
            full.push_str(arg);
        }
        self.allows(full.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// Domain filter: a URL passes when its host equals an allowed domain or is
/// a subdomain of one. An empty list lets everything through.
#[derive(Debug, Clone, Default)]
pub struct DomainAllowlist {
    domains: Vec<String>,
}

impl DomainAllowlist {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domains = domains
            .into_iter()
            .map(|d| d.into().trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self { domains }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn allows_url(&self, url: &str) -> bool {
        if self.domains.is_empty() {
            return true;
        }
        let Some(host) = url_host(url) else {
            return false;
        };
        self.domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }
}

/// True for `http://` and `https://` URLs with a host.
pub fn is_http_url(url: &str) -> bool {
    Url::parse(url.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

/// Lowercased host of an absolute URL, as the WHATWG parser sees it.
/// IPv6 hosts come back without brackets.
pub fn url_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    match parsed.host()? {
        Host::Domain(d) if d.is_empty() => None,
        Host::Domain(d) => Some(d.to_lowercase()),
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
    }
}
