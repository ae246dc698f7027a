// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory source client
//!
//! Serves canned repository data. Used by tests and for replaying a captured
//! repository state without network access. Individual endpoints can be
//! switched to fail so degraded scans can be exercised.

use async_trait::async_trait;
use dt_domain_types::{RepoRef, RepositoryMetadata};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::error::{SourceError, SourceResult};
use crate::records::{Release, SourceCommit, Tag, WorkflowRun};
use crate::SourceClient;

/// Endpoints served by a [`SourceClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Repository,
    Commits,
    WorkflowRuns,
    Tags,
    Releases,
}

#[derive(Debug, Default)]
struct FixtureData {
    metadata: Option<RepositoryMetadata>,
    commits: Vec<SourceCommit>,
    runs: Vec<WorkflowRun>,
    tags: Vec<Tag>,
    releases: Vec<Release>,
    failing: HashSet<Endpoint>,
}

/// Source client backed by fixed in-memory listings
#[derive(Debug, Default)]
pub struct StaticSourceClient {
    data: Mutex<FixtureData>,
}

impl StaticSourceClient {
    pub fn new(metadata: RepositoryMetadata) -> Self {
        Self {
            data: Mutex::new(FixtureData {
                metadata: Some(metadata),
                ..Default::default()
            }),
        }
    }

    pub fn with_commits(self, commits: Vec<SourceCommit>) -> Self {
        self.set_commits(commits);
        self
    }

    pub fn with_workflow_runs(self, runs: Vec<WorkflowRun>) -> Self {
        self.set_workflow_runs(runs);
        self
    }

    pub fn with_tags(self, tags: Vec<Tag>) -> Self {
        self.set_tags(tags);
        self
    }

    pub fn with_releases(self, releases: Vec<Release>) -> Self {
        self.set_releases(releases);
        self
    }

    pub fn set_commits(&self, commits: Vec<SourceCommit>) {
        if let Ok(mut data) = self.data.lock() {
            data.commits = commits;
        }
    }

    pub fn set_workflow_runs(&self, runs: Vec<WorkflowRun>) {
        if let Ok(mut data) = self.data.lock() {
            data.runs = runs;
        }
    }

    pub fn set_tags(&self, tags: Vec<Tag>) {
        if let Ok(mut data) = self.data.lock() {
            data.tags = tags;
        }
    }

    pub fn set_releases(&self, releases: Vec<Release>) {
        if let Ok(mut data) = self.data.lock() {
            data.releases = releases;
        }
    }

    /// Make `endpoint` fail with [`SourceError::Unavailable`] (or recover when `false`)
    pub fn set_failing(&self, endpoint: Endpoint, failing: bool) {
        if let Ok(mut data) = self.data.lock() {
            if failing {
                data.failing.insert(endpoint);
            } else {
                data.failing.remove(&endpoint);
            }
        }
    }

    fn serve(&self, endpoint: Endpoint) -> SourceResult<MutexGuard<'_, FixtureData>> {
        let data = self
            .data
            .lock()
            .map_err(|e| SourceError::Unavailable(format!("fixture lock poisoned: {e}")))?;
        if data.failing.contains(&endpoint) {
            return Err(SourceError::Unavailable(format!(
                "{endpoint:?} endpoint is switched off"
            )));
        }
        Ok(data)
    }
}

#[async_trait]
impl SourceClient for StaticSourceClient {
    async fn get_repository(&self, repo: &RepoRef) -> SourceResult<RepositoryMetadata> {
        self.serve(Endpoint::Repository)?
            .metadata
            .clone()
            .ok_or_else(|| SourceError::Unavailable(format!("repository {repo} not found")))
    }

    async fn list_commits(
        &self,
        _repo: &RepoRef,
        _branch: &str,
    ) -> SourceResult<Vec<SourceCommit>> {
        Ok(self.serve(Endpoint::Commits)?.commits.clone())
    }

    async fn list_workflow_runs(
        &self,
        _repo: &RepoRef,
        _branch: &str,
    ) -> SourceResult<Vec<WorkflowRun>> {
        Ok(self.serve(Endpoint::WorkflowRuns)?.runs.clone())
    }

    async fn list_tags(&self, _repo: &RepoRef) -> SourceResult<Vec<Tag>> {
        Ok(self.serve(Endpoint::Tags)?.tags.clone())
    }

    async fn list_releases(&self, _repo: &RepoRef) -> SourceResult<Vec<Release>> {
        Ok(self.serve(Endpoint::Releases)?.releases.clone())
    }

    fn description(&self) -> &str {
        "static fixture"
    }
}
