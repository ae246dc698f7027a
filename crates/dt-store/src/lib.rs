// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Timeline persistence
//!
//! The [`TimelineStore`] trait is the only way the reconciliation engine
//! touches storage. Every write is get-or-create on the record's natural
//! key, so repeated or concurrent scans of the same repository never
//! produce duplicate rows; the uniqueness constraint is the sole
//! correctness mechanism and no lock is held across a scan.

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryTimelineStore;
pub use sqlite::SqliteTimelineStore;

use async_trait::async_trait;
use dt_domain_types::{
    Branch, Commit, Deployment, DeploymentKey, NewCommit, NewDeployment, RepoRef, Repository,
    RepositoryMetadata,
};

/// Outcome of a get-or-create write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored<T> {
    pub record: T,
    /// `false` when the natural key already existed and the stored row was returned unchanged
    pub created: bool,
}

impl<T> Stored<T> {
    pub fn created(record: T) -> Self {
        Self {
            record,
            created: true,
        }
    }

    pub fn existing(record: T) -> Self {
        Self {
            record,
            created: false,
        }
    }
}

/// Append-only timeline storage
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Look up a repository by (owner, name)
    async fn find_repository(&self, repo: &RepoRef) -> StoreResult<Option<Repository>>;

    /// Get-or-create a repository by (owner, name)
    async fn get_or_create_repository(
        &self,
        repo: &RepoRef,
        metadata: &RepositoryMetadata,
    ) -> StoreResult<Stored<Repository>>;

    /// Look up a branch by (repository, name)
    async fn find_branch(
        &self,
        repository: &Repository,
        name: &str,
    ) -> StoreResult<Option<Branch>>;

    /// Get-or-create a branch by (repository, name)
    async fn get_or_create_branch(
        &self,
        repository: &Repository,
        name: &str,
    ) -> StoreResult<Stored<Branch>>;

    /// Look up a commit by (repository, branch, sha)
    async fn find_commit(&self, branch: &Branch, sha: &str) -> StoreResult<Option<Commit>>;

    /// Get-or-create a commit by (repository, branch, sha). Existing rows are never overwritten.
    async fn get_or_create_commit(
        &self,
        branch: &Branch,
        commit: &NewCommit,
    ) -> StoreResult<Stored<Commit>>;

    /// Look up a deployment by (repository, branch, commit, name)
    async fn find_deployment(&self, key: &DeploymentKey) -> StoreResult<Option<Deployment>>;

    /// Get-or-create a deployment by (repository, branch, commit, name)
    async fn get_or_create_deployment(
        &self,
        deployment: &NewDeployment,
    ) -> StoreResult<Stored<Deployment>>;

    /// Insert a batch of deployments, skipping natural keys that already exist.
    /// Returns the number of rows written.
    async fn insert_deployments(&self, deployments: &[NewDeployment]) -> StoreResult<usize>;

    /// Commits of a branch ordered by timestamp, then insertion
    async fn list_commits(&self, branch: &Branch) -> StoreResult<Vec<Commit>>;

    /// Deployments of a branch ordered by `started_at`, then insertion
    async fn list_deployments(&self, branch: &Branch) -> StoreResult<Vec<Deployment>>;
}
