// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! GitHub REST API client implementation

use async_trait::async_trait;
use dt_domain_types::{RepoRef, RepositoryMetadata};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::{SourceError, SourceResult};
use crate::github::{
    next_page_url, CommitPayload, ReleasePayload, RepoPayload, TagPayload, WorkflowRunsPage,
};
use crate::records::{Release, SourceCommit, Tag, WorkflowRun};
use crate::SourceClient;

/// Public GitHub API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Largest page size GitHub accepts
pub const MAX_PER_PAGE: u8 = 100;

const USER_AGENT: &str = concat!("deploy-timeline/", env!("CARGO_PKG_VERSION"));

/// REST client for the GitHub API
#[derive(Debug, Clone)]
pub struct GithubClient {
    http_client: HttpClient,
    base_url: Url,
    per_page: u8,
    description: String,
}

impl GithubClient {
    /// Create a new client. `token` is sent as a bearer token when present.
    pub fn new(mut base_url: Url, token: Option<&str>) -> SourceResult<Self> {
        // Endpoint paths are joined relative to the base, which must end in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = HttpClient::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            description: base_url.to_string(),
            base_url,
            per_page: MAX_PER_PAGE,
        })
    }

    /// Create a client from a base URL string
    pub fn from_url(base_url: &str, token: Option<&str>) -> SourceResult<Self> {
        let base_url = Url::parse(base_url)?;
        Self::new(base_url, token)
    }

    /// Override the page size, clamped to `1..=100`
    pub fn with_per_page(mut self, per_page: u8) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn per_page(&self) -> u8 {
        self.per_page
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> SourceResult<Url> {
        let mut url = self.base_url.join(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("per_page", &self.per_page.to_string());
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> SourceResult<T> {
        let url = self.base_url.join(path)?;
        let response = self.http_client.get(url.clone()).send().await?;
        let response = Self::check_status(url.as_str(), response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(SourceError::from)
    }

    /// Follow `Link: rel="next"` until the listing is exhausted
    async fn paginate<P, T>(
        &self,
        first: Url,
        extract: impl Fn(P) -> Vec<T>,
    ) -> SourceResult<Vec<T>>
    where
        P: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut next = Some(first.to_string());
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let response = self.http_client.get(&url).send().await?;
            let response = Self::check_status(&url, response).await?;

            next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(next_page_url);

            let text = response.text().await?;
            let page: P = serde_json::from_str(&text)?;
            let mut page_items = extract(page);
            pages += 1;
            trace!(%url, page = pages, items = page_items.len(), "Fetched page");
            items.append(&mut page_items);
        }

        debug!(endpoint = %first.path(), pages, items = items.len(), "Pagination finished");
        Ok(items)
    }

    async fn check_status(url: &str, response: Response) -> SourceResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|remaining| remaining == "0");
        let throttled = status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && exhausted);
        if throttled {
            let reset_at = response
                .headers()
                .get("x-ratelimit-reset")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            return Err(SourceError::RateLimited { reset_at });
        }

        let body = response.text().await.unwrap_or_default();
        Err(SourceError::Status {
            status,
            url: url.to_string(),
            body,
        })
    }
}

#[async_trait]
impl SourceClient for GithubClient {
    async fn get_repository(&self, repo: &RepoRef) -> SourceResult<RepositoryMetadata> {
        let payload: RepoPayload = self
            .get(&format!("repos/{}/{}", repo.owner, repo.name))
            .await?;
        Ok(payload.into())
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> SourceResult<Vec<SourceCommit>> {
        let url = self.endpoint(
            &format!("repos/{}/{}/commits", repo.owner, repo.name),
            &[("sha", branch)],
        )?;
        self.paginate(url, |page: Vec<CommitPayload>| {
            page.into_iter().map(SourceCommit::from).collect()
        })
        .await
    }

    async fn list_workflow_runs(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> SourceResult<Vec<WorkflowRun>> {
        let url = self.endpoint(
            &format!("repos/{}/{}/actions/runs", repo.owner, repo.name),
            &[("branch", branch)],
        )?;
        self.paginate(url, |page: WorkflowRunsPage| {
            page.workflow_runs.into_iter().map(WorkflowRun::from).collect()
        })
        .await
    }

    async fn list_tags(&self, repo: &RepoRef) -> SourceResult<Vec<Tag>> {
        let url = self.endpoint(&format!("repos/{}/{}/tags", repo.owner, repo.name), &[])?;
        self.paginate(url, |page: Vec<TagPayload>| {
            page.into_iter().map(Tag::from).collect()
        })
        .await
    }

    async fn list_releases(&self, repo: &RepoRef) -> SourceResult<Vec<Release>> {
        let url = self.endpoint(&format!("repos/{}/{}/releases", repo.owner, repo.name), &[])?;
        self.paginate(url, |page: Vec<ReleasePayload>| {
            page.into_iter().map(Release::from).collect()
        })
        .await
    }

    fn description(&self) -> &str {
        &self.description
    }
}
