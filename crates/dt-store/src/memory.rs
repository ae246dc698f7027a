// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory timeline store (for development/testing)

use async_trait::async_trait;
use dt_domain_types::{
    Branch, Commit, Deployment, DeploymentKey, NewCommit, NewDeployment, RepoRef, Repository,
    RepositoryMetadata,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::{StoreError, StoreResult, Stored, TimelineStore};

#[derive(Debug, Default)]
struct MemoryState {
    repositories: Vec<Repository>,
    branches: Vec<Branch>,
    commits: Vec<Commit>,
    commit_index: HashMap<(i64, i64, String), usize>,
    deployments: Vec<Deployment>,
    deployment_index: HashMap<DeploymentKey, usize>,
}

impl MemoryState {
    fn next_id(len: usize) -> i64 {
        len as i64 + 1
    }

    fn insert_deployment(&mut self, deployment: &NewDeployment) -> Stored<Deployment> {
        let key = deployment.key();
        if let Some(&index) = self.deployment_index.get(&key) {
            return Stored::existing(self.deployments[index].clone());
        }

        let id = Self::next_id(self.deployments.len());
        let record = deployment.clone().normalized().into_deployment(id);
        self.deployment_index.insert(key, self.deployments.len());
        self.deployments.push(record.clone());
        Stored::created(record)
    }
}

/// Timeline store that keeps every row in process memory
#[derive(Debug, Default)]
pub struct InMemoryTimelineStore {
    state: RwLock<MemoryState>,
    reject_writes: AtomicBool,
}

impl InMemoryTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with [`StoreError::Rejected`]
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("store is read-only".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TimelineStore for InMemoryTimelineStore {
    async fn find_repository(&self, repo: &RepoRef) -> StoreResult<Option<Repository>> {
        let state = self.state.read().await;
        Ok(state
            .repositories
            .iter()
            .find(|r| r.owner == repo.owner && r.name == repo.name)
            .cloned())
    }

    async fn get_or_create_repository(
        &self,
        repo: &RepoRef,
        metadata: &RepositoryMetadata,
    ) -> StoreResult<Stored<Repository>> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .repositories
            .iter()
            .find(|r| r.owner == repo.owner && r.name == repo.name)
        {
            return Ok(Stored::existing(existing.clone()));
        }
        self.check_writable()?;

        let record = Repository {
            id: MemoryState::next_id(state.repositories.len()),
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            private: metadata.private,
            default_branch: metadata.default_branch.clone(),
        };
        state.repositories.push(record.clone());
        Ok(Stored::created(record))
    }

    async fn find_branch(
        &self,
        repository: &Repository,
        name: &str,
    ) -> StoreResult<Option<Branch>> {
        let state = self.state.read().await;
        Ok(state
            .branches
            .iter()
            .find(|b| b.repository_id == repository.id && b.name == name)
            .cloned())
    }

    async fn get_or_create_branch(
        &self,
        repository: &Repository,
        name: &str,
    ) -> StoreResult<Stored<Branch>> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .branches
            .iter()
            .find(|b| b.repository_id == repository.id && b.name == name)
        {
            return Ok(Stored::existing(existing.clone()));
        }
        self.check_writable()?;

        let record = Branch {
            id: MemoryState::next_id(state.branches.len()),
            repository_id: repository.id,
            name: name.to_string(),
        };
        state.branches.push(record.clone());
        Ok(Stored::created(record))
    }

    async fn find_commit(&self, branch: &Branch, sha: &str) -> StoreResult<Option<Commit>> {
        let state = self.state.read().await;
        let key = (branch.repository_id, branch.id, sha.to_string());
        Ok(state
            .commit_index
            .get(&key)
            .map(|&index| state.commits[index].clone()))
    }

    async fn get_or_create_commit(
        &self,
        branch: &Branch,
        commit: &NewCommit,
    ) -> StoreResult<Stored<Commit>> {
        let mut state = self.state.write().await;
        let key = (branch.repository_id, branch.id, commit.sha.clone());
        if let Some(&index) = state.commit_index.get(&key) {
            return Ok(Stored::existing(state.commits[index].clone()));
        }
        self.check_writable()?;

        let record = Commit {
            id: MemoryState::next_id(state.commits.len()),
            repository_id: branch.repository_id,
            branch_id: branch.id,
            sha: commit.sha.clone(),
            author: commit.author.clone(),
            message: commit.message.clone(),
            timestamp: commit.timestamp,
        };
        let index = state.commits.len();
        state.commits.push(record.clone());
        state.commit_index.insert(key, index);
        Ok(Stored::created(record))
    }

    async fn find_deployment(&self, key: &DeploymentKey) -> StoreResult<Option<Deployment>> {
        let state = self.state.read().await;
        Ok(state
            .deployment_index
            .get(key)
            .map(|&index| state.deployments[index].clone()))
    }

    async fn get_or_create_deployment(
        &self,
        deployment: &NewDeployment,
    ) -> StoreResult<Stored<Deployment>> {
        let mut state = self.state.write().await;
        if let Some(&index) = state.deployment_index.get(&deployment.key()) {
            return Ok(Stored::existing(state.deployments[index].clone()));
        }
        self.check_writable()?;
        Ok(state.insert_deployment(deployment))
    }

    async fn insert_deployments(&self, deployments: &[NewDeployment]) -> StoreResult<usize> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        Ok(deployments
            .iter()
            .map(|deployment| state.insert_deployment(deployment))
            .filter(|stored| stored.created)
            .count())
    }

    async fn list_commits(&self, branch: &Branch) -> StoreResult<Vec<Commit>> {
        let state = self.state.read().await;
        let mut commits: Vec<Commit> = state
            .commits
            .iter()
            .filter(|c| c.branch_id == branch.id)
            .cloned()
            .collect();
        commits.sort_by_key(|c| (c.timestamp, c.id));
        Ok(commits)
    }

    async fn list_deployments(&self, branch: &Branch) -> StoreResult<Vec<Deployment>> {
        let state = self.state.read().await;
        let mut deployments: Vec<Deployment> = state
            .deployments
            .iter()
            .filter(|d| d.branch_id == branch.id)
            .cloned()
            .collect();
        deployments.sort_by_key(|d| (d.started_at, d.id));
        Ok(deployments)
    }
}
