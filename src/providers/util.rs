use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use std::time::Duration;

pub const USER_AGENT: &str = "stockpulse/0.1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds an HTTP client with the crate's user agent and a finite request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Joins `segments` onto `base_url` as percent-encoded path segments and
/// appends `query` pairs, so caller-supplied symbols cannot alter the request.
pub fn endpoint_url(base_url: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
    let mut url =
        Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Base URL cannot have a path: {}", base_url))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}
