//! Security policies for toolweave tools.
//!
//! Provides:
//! - **Path containment**: resolve model-supplied relative paths under a fixed root
//! - **Allowlists**: prefix gates for commands, scripts and URLs, plus a
//!   domain filter for search results

pub mod allowlist;
pub mod path;

pub use allowlist::{DomainAllowlist, PrefixAllowlist, is_http_url, url_host};
pub use path::{PathValidationError, resolve_within_root};
