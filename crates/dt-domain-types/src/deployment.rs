// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Deployment domain types
//!
//! A deployment ties a commit to the moment it shipped. Observed deployments
//! come straight from a workflow run or a release; inferred ones are
//! synthesized for commits that rode along with a later observed deployment.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Well-known deployment status values. The set is open: workflow
/// conclusions are passed through verbatim.
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const FAILURE: &str = "failure";
    pub const UNKNOWN: &str = "unknown";
}

/// How a deployment entered the timeline
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provenance {
    /// Directly evidenced by a workflow run or a release
    Observed,
    /// Synthesized by the gap reconciler
    Inferred,
}

/// A deployment that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeployment {
    pub repository_id: i64,
    pub branch_id: i64,
    pub commit_id: i64,
    pub commit_sha: String,
    pub name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub provenance: Provenance,
}

impl NewDeployment {
    /// Drops a `finished_at` that precedes `started_at`; such a pair cannot
    /// describe a real deployment window.
    pub fn normalized(mut self) -> Self {
        if let Some(finished_at) = self.finished_at {
            if finished_at < self.started_at {
                tracing::debug!(
                    sha = %self.commit_sha,
                    name = %self.name,
                    %finished_at,
                    started_at = %self.started_at,
                    "Dropping finished_at earlier than started_at"
                );
                self.finished_at = None;
            }
        }
        self
    }

    /// Natural identity: at most one deployment per (repository, branch, commit, name)
    pub fn key(&self) -> DeploymentKey {
        DeploymentKey {
            repository_id: self.repository_id,
            branch_id: self.branch_id,
            commit_id: self.commit_id,
            name: self.name.clone(),
        }
    }

    pub fn into_deployment(self, id: i64) -> Deployment {
        let duration_secs = duration_between(self.started_at, self.finished_at)
            .map(|duration| duration.num_seconds());
        Deployment {
            id,
            repository_id: self.repository_id,
            branch_id: self.branch_id,
            commit_id: self.commit_id,
            commit_sha: self.commit_sha,
            name: self.name,
            status: self.status,
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_secs,
            provenance: self.provenance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentKey {
    pub repository_id: i64,
    pub branch_id: i64,
    pub commit_id: i64,
    pub name: String,
}

/// Persisted deployment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: i64,
    pub repository_id: i64,
    pub branch_id: i64,
    pub commit_id: i64,
    pub commit_sha: String,
    pub name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub provenance: Provenance,
}

impl Deployment {
    /// `finished_at - started_at`, or `None` while the deployment has no end time
    pub fn duration(&self) -> Option<Duration> {
        duration_between(self.started_at, self.finished_at)
    }

    pub fn key(&self) -> DeploymentKey {
        DeploymentKey {
            repository_id: self.repository_id,
            branch_id: self.branch_id,
            commit_id: self.commit_id,
            name: self.name.clone(),
        }
    }
}

impl From<&Deployment> for NewDeployment {
    fn from(deployment: &Deployment) -> Self {
        NewDeployment {
            repository_id: deployment.repository_id,
            branch_id: deployment.branch_id,
            commit_id: deployment.commit_id,
            commit_sha: deployment.commit_sha.clone(),
            name: deployment.name.clone(),
            status: deployment.status.clone(),
            started_at: deployment.started_at,
            finished_at: deployment.finished_at,
            provenance: deployment.provenance,
        }
    }
}

fn duration_between(
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
) -> Option<Duration> {
    finished_at.map(|finished_at| finished_at - started_at)
}
