//! GitHub REST client: repository metadata, star counts and the core
//! rate-limit budget.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use starwatch_core::config::GitHubConfig;
use starwatch_core::error::{Result, StarwatchError};
use starwatch_core::traits::{RepoResolver, StarSource};
use starwatch_core::types::{Quota, RepoInfo};
use std::time::Duration;

const USER_AGENT: &str = concat!("starwatch/", env!("CARGO_PKG_VERSION"));

/// GitHub REST API client.
pub struct GitHubClient {
    config: GitHubConfig,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| StarwatchError::Config(format!("HTTP client: {e}")))?;
        if config.token.is_none() {
            tracing::warn!("⚠️ No GitHub token configured, unauthenticated limit is 60 calls/hour");
        }
        Ok(Self { config, client })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self
            .client
            .get(self.api_url(path))
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match self.config.token.as_deref() {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    /// Repository metadata for `owner/name`.
    pub async fn fetch_repo(&self, full_name: &str) -> Result<RepoInfo> {
        let response = self
            .get(&format!("repos/{full_name}"))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response, full_name).await?;
        response
            .json::<RepoInfo>()
            .await
            .map_err(|e| StarwatchError::Api(format!("Invalid repository payload: {e}")))
    }

    /// Remaining budget of the core REST bucket.
    pub async fn fetch_rate_limit(&self) -> Result<Quota> {
        let response = self
            .get("rate_limit")
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response, "rate_limit").await?;
        let body: RateLimitResponse = response
            .json()
            .await
            .map_err(|e| StarwatchError::Api(format!("Invalid rate_limit payload: {e}")))?;

        let core = body.resources.core;
        Ok(Quota {
            remaining: core.remaining,
            limit: core.limit,
            reset_at: DateTime::from_timestamp(core.reset, 0).unwrap_or_else(Utc::now),
        })
    }
}

#[async_trait]
impl StarSource for GitHubClient {
    async fn fetch_stars(&self, full_name: &str) -> Result<i64> {
        Ok(self.fetch_repo(full_name).await?.stargazers_count)
    }

    async fn rate_limit(&self) -> Result<Quota> {
        self.fetch_rate_limit().await
    }
}

#[async_trait]
impl RepoResolver for GitHubClient {
    async fn resolve(&self, full_name: &str) -> Result<RepoInfo> {
        self.fetch_repo(full_name).await
    }
}

// --- Error mapping ---

fn transport_error(e: reqwest::Error) -> StarwatchError {
    StarwatchError::Transient(format!("GitHub request failed: {e}"))
}

async fn check_status(response: Response, subject: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let headers = response.headers().clone();
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, &headers, &body, subject))
}

/// Map a non-success response onto the error taxonomy the poller uses.
fn classify(status: StatusCode, headers: &HeaderMap, body: &str, subject: &str) -> StarwatchError {
    let exhausted = header_value::<u64>(headers, "x-ratelimit-remaining") == Some(0);
    let reset_at = header_value::<i64>(headers, "x-ratelimit-reset")
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    match status {
        StatusCode::NOT_FOUND => StarwatchError::NotFound(subject.to_string()),
        StatusCode::TOO_MANY_REQUESTS => StarwatchError::RateLimited { reset_at },
        StatusCode::FORBIDDEN if exhausted => StarwatchError::RateLimited { reset_at },
        s if s.is_server_error() => {
            StarwatchError::Transient(format!("GitHub {s} for {subject}"))
        }
        s => StarwatchError::Api(format!("GitHub {s} for {subject}: {}", api_message(body))),
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn api_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

// --- GitHub API Types ---

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimitBucket,
}

#[derive(Debug, Deserialize)]
struct RateLimitBucket {
    limit: u64,
    remaining: u64,
    reset: i64,
}
