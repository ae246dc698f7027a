// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! GitHub REST wire types and their conversion into source records

use chrono::{DateTime, Utc};
use dt_domain_types::RepositoryMetadata;
use serde::Deserialize;

use crate::records::{Release, SourceCommit, Tag, WorkflowRun};

#[derive(Debug, Deserialize)]
pub(crate) struct RepoPayload {
    pub private: bool,
    pub default_branch: String,
}

impl From<RepoPayload> for RepositoryMetadata {
    fn from(payload: RepoPayload) -> Self {
        Self {
            private: payload.private,
            default_branch: payload.default_branch,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitPayload {
    pub sha: String,
    pub commit: CommitDetails,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitDetails {
    #[serde(default)]
    pub author: Option<Signature>,
    #[serde(default)]
    pub committer: Option<Signature>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Signature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl From<CommitPayload> for SourceCommit {
    fn from(payload: CommitPayload) -> Self {
        let CommitDetails {
            author,
            committer,
            message,
        } = payload.commit;
        Self {
            sha: payload.sha,
            author: author.and_then(|author| author.name),
            message,
            committed_at: committer.and_then(|committer| committer.date),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowRunsPage {
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRunPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowRunPayload {
    #[serde(default)]
    pub name: Option<String>,
    pub head_sha: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WorkflowRunPayload> for WorkflowRun {
    fn from(payload: WorkflowRunPayload) -> Self {
        Self {
            name: payload.name,
            head_sha: payload.head_sha,
            conclusion: payload.conclusion,
            created_at: payload.created_at,
            updated_at: payload.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagPayload {
    pub name: String,
    pub commit: TagTarget,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagTarget {
    pub sha: String,
}

impl From<TagPayload> for Tag {
    fn from(payload: TagPayload) -> Self {
        Self {
            name: payload.name,
            target_sha: payload.commit.sha,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReleasePayload {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl From<ReleasePayload> for Release {
    fn from(payload: ReleasePayload) -> Self {
        Self {
            tag_name: payload.tag_name,
            name: payload.name,
            published_at: payload.published_at,
        }
    }
}

/// Extract the `rel="next"` target from a `Link` response header
pub(crate) fn next_page_url(link_header: &str) -> Option<String> {
    link_header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|target| target.strip_suffix('>'))
            .map(str::to_string)
    })
}
