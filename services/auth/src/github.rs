//! GitHub identity lookup for stored OAuth tokens

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use crate::vault::{IdentityLookup, ProviderIdentity};

/// GitHub API configuration
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API base URL (default: https://api.github.com)
    pub api_url: String,
    /// Request timeout in seconds (default: 10)
    pub timeout: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            timeout: 10,
        }
    }
}

impl GitHubConfig {
    /// Create a new GitHubConfig from environment variables
    ///
    /// # Environment Variables
    /// - `GITHUB_API_URL`: API base URL (default: https://api.github.com)
    /// - `GITHUB_TIMEOUT`: Request timeout in seconds (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = std::env::var("GITHUB_API_URL").unwrap_or(defaults.api_url);
        let timeout = std::env::var("GITHUB_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.timeout);

        Self { api_url, timeout }
    }
}

/// GitHub user profile response
#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

/// Resolves the GitHub account behind a token via `GET /user`
#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    config: GitHubConfig,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self { client, config })
    }
}

/// Parse the comma separated `X-OAuth-Scopes` header
pub fn parse_scopes(headers: &HeaderMap) -> Vec<String> {
    headers
        .get("x-oauth-scopes")
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|scope| !scope.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl IdentityLookup for GitHubClient {
    async fn lookup(&self, token: &str) -> Result<ProviderIdentity> {
        info!("Looking up GitHub identity");

        let response = self
            .client
            .get(format!("{}/user", self.config.api_url.trim_end_matches('/')))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(USER_AGENT, "git-nacht-auth")
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to get GitHub user profile: {}",
                response.status()
            ));
        }

        let scopes = parse_scopes(response.headers());
        let user: GitHubUser = response.json().await?;

        Ok(ProviderIdentity {
            username: user.login,
            scopes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_scopes() {
        let mut headers = HeaderMap::new();
        headers.insert("x-oauth-scopes", HeaderValue::from_static("repo, read:user,  gist"));
        assert_eq!(parse_scopes(&headers), vec!["repo", "read:user", "gist"]);
    }

    #[test]
    fn test_parse_scopes_missing_or_empty() {
        assert!(parse_scopes(&HeaderMap::new()).is_empty());

        let mut headers = HeaderMap::new();
        headers.insert("x-oauth-scopes", HeaderValue::from_static(""));
        assert!(parse_scopes(&headers).is_empty());
    }
}
