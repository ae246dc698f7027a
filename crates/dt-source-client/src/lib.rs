// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Source-control API client for the deployment timeline
//!
//! This crate is a thin adapter over a paginated source-control API. It
//! lists commits, workflow runs, tags and releases and carries no
//! correlation logic of its own beyond following pagination links.
//!
//! ## Design Principles
//!
//! Consumers program against the [`SourceClient`] trait. [`GithubClient`]
//! talks to the GitHub REST API; [`StaticSourceClient`] serves canned data
//! for tests and offline runs.

pub mod client;
pub mod error;
pub mod fixture;
pub mod records;

mod github;

pub use client::*;
pub use error::*;
pub use fixture::*;
pub use records::*;

use async_trait::async_trait;
use dt_domain_types::{RepoRef, RepositoryMetadata};

/// Read-only view of a source-control host
///
/// Every listing is fully paginated by the implementation. Any transport,
/// auth or rate-limit failure is reported as a [`SourceError`].
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetch repository metadata (visibility, default branch)
    async fn get_repository(&self, repo: &RepoRef) -> SourceResult<RepositoryMetadata>;

    /// List every commit reachable from the tip of `branch`
    async fn list_commits(&self, repo: &RepoRef, branch: &str) -> SourceResult<Vec<SourceCommit>>;

    /// List the CI workflow runs recorded for `branch`
    async fn list_workflow_runs(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> SourceResult<Vec<WorkflowRun>>;

    /// List every tag in the repository
    async fn list_tags(&self, repo: &RepoRef) -> SourceResult<Vec<Tag>>;

    /// List every release in the repository
    async fn list_releases(&self, repo: &RepoRef) -> SourceResult<Vec<Release>>;

    /// Get a human-readable description of this source
    fn description(&self) -> &str;
}
