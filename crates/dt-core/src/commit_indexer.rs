// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Commit indexing
//!
//! Brings every commit reachable from the branch tip into the store. A
//! commit that is already indexed is returned as stored and never
//! overwritten; a new commit without a timestamp cannot be placed on the
//! timeline and is skipped.

use crate::engine::ScanContext;
use crate::{Error, Result, ScanStep, Skipped};
use dt_domain_types::{Commit, NewCommit};
use dt_source_client::{SourceClient, SourceCommit};
use dt_store::TimelineStore;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;

/// Deduplicated commit set for one branch
#[derive(Debug, Clone, Default)]
pub struct IndexOutcome {
    /// One entry per SHA, in listing order
    pub commits: Vec<Commit>,
    /// Commit rows written by this pass
    pub created: usize,
    pub skipped: Vec<Skipped>,
    /// The listing was unavailable and the pass ran on zero results
    pub degraded: bool,
}

enum Indexed {
    Commit { commit: Commit, created: bool },
    Skipped(Skipped),
}

pub struct CommitIndexer {
    source: Arc<dyn SourceClient>,
    store: Arc<dyn TimelineStore>,
    max_concurrency: usize,
}

impl CommitIndexer {
    pub fn new(
        source: Arc<dyn SourceClient>,
        store: Arc<dyn TimelineStore>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            source,
            store,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub async fn index(&self, ctx: &ScanContext) -> Result<IndexOutcome> {
        let listed = match self.source.list_commits(&ctx.repo, &ctx.branch.name).await {
            Ok(listed) => listed,
            Err(err) => {
                tracing::warn!(
                    repo = %ctx.repo,
                    branch = %ctx.branch.name,
                    error = %err,
                    "Commit listing unavailable, indexing zero commits"
                );
                return Ok(IndexOutcome {
                    degraded: true,
                    ..Default::default()
                });
            }
        };
        tracing::debug!(count = listed.len(), "Listed commits");

        let mut seen = HashSet::new();
        let unique: Vec<SourceCommit> =
            listed.into_iter().filter(|commit| seen.insert(commit.sha.clone())).collect();

        let results: Vec<Result<Indexed>> = stream::iter(unique)
            .map(|commit| self.index_one(ctx, commit))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut outcome = IndexOutcome::default();
        for result in results {
            match result? {
                Indexed::Commit { commit, created } => {
                    if created {
                        outcome.created += 1;
                    }
                    outcome.commits.push(commit);
                }
                Indexed::Skipped(skipped) => outcome.skipped.push(skipped),
            }
        }

        tracing::info!(
            indexed = outcome.commits.len(),
            created = outcome.created,
            skipped = outcome.skipped.len(),
            "Indexed commits"
        );
        Ok(outcome)
    }

    async fn index_one(&self, ctx: &ScanContext, commit: SourceCommit) -> Result<Indexed> {
        let existing = self
            .store
            .find_commit(&ctx.branch, &commit.sha)
            .await
            .map_err(Error::persistence(ScanStep::CommitIndexing))?;
        if let Some(existing) = existing {
            return Ok(Indexed::Commit {
                commit: existing,
                created: false,
            });
        }

        let Some(timestamp) = commit.committed_at else {
            tracing::warn!(sha = %commit.sha, "Skipping commit without a timestamp");
            return Ok(Indexed::Skipped(Skipped::missing_field(
                commit.sha,
                "timestamp",
            )));
        };

        let new_commit = NewCommit {
            sha: commit.sha,
            author: commit.author,
            message: commit.message,
            timestamp,
        };
        let stored = self
            .store
            .get_or_create_commit(&ctx.branch, &new_commit)
            .await
            .map_err(Error::persistence(ScanStep::CommitIndexing))?;

        Ok(Indexed::Commit {
            commit: stored.record,
            created: stored.created,
        })
    }
}
