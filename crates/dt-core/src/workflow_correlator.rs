// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Workflow run correlation
//!
//! Every run that passes the [`RunFilter`] and whose head SHA is in the
//! indexed commit set becomes an observed deployment. Runs pointing at
//! commits outside the set are discarded; no commit is fetched on demand.

use crate::engine::ScanContext;
use crate::{CorrelationOutcome, Error, ReferenceKind, Result, ScanStep, Skipped};
use dt_domain_types::{status, Commit, NewDeployment, Provenance, RunFilter};
use dt_source_client::{SourceClient, WorkflowRun};
use dt_store::TimelineStore;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;

/// Name given to runs the host reports without one
pub const UNNAMED_RUN: &str = "workflow run";

pub struct WorkflowRunCorrelator {
    source: Arc<dyn SourceClient>,
    store: Arc<dyn TimelineStore>,
    max_concurrency: usize,
}

impl WorkflowRunCorrelator {
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

    pub async fn correlate(
        &self,
        ctx: &ScanContext,
        commits: &[Commit],
        filter: &RunFilter,
    ) -> Result<CorrelationOutcome> {
        let runs = match self.source.list_workflow_runs(&ctx.repo, &ctx.branch.name).await {
            Ok(runs) => runs,
            Err(err) => {
                tracing::warn!(
                    repo = %ctx.repo,
                    branch = %ctx.branch.name,
                    error = %err,
                    "Workflow runs unavailable, correlating zero runs"
                );
                return Ok(CorrelationOutcome::degraded());
            }
        };
        if runs.is_empty() {
            tracing::info!(branch = %ctx.branch.name, "No workflow runs found");
            return Ok(CorrelationOutcome::default());
        }

        let listed = runs.len();
        let by_sha: HashMap<&str, &Commit> =
            commits.iter().map(|commit| (commit.sha.as_str(), commit)).collect();

        let mut outcome = CorrelationOutcome::default();
        let mut pending = Vec::new();
        for run in runs
            .into_iter()
            .filter(|run| filter.matches(run.name.as_deref(), run.created_at))
        {
            match by_sha.get(run.head_sha.as_str()) {
                Some(commit) => pending.push(run_deployment(ctx, commit, run)),
                None => {
                    tracing::debug!(
                        run = run.name.as_deref().unwrap_or(UNNAMED_RUN),
                        head_sha = %run.head_sha,
                        "Discarding run for a commit outside the indexed set"
                    );
                    outcome.skipped.push(Skipped::unresolved(
                        run.name.unwrap_or_else(|| UNNAMED_RUN.to_string()),
                        ReferenceKind::WorkflowRunHead,
                        run.head_sha,
                    ));
                }
            }
        }

        let stored: Vec<_> = stream::iter(pending)
            .map(|deployment| async move {
                self.store
                    .get_or_create_deployment(&deployment)
                    .await
                    .map_err(Error::persistence(ScanStep::WorkflowCorrelation))
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;
        for stored in stored {
            let stored = stored?;
            outcome.push(stored.record, stored.created);
        }

        tracing::info!(
            listed,
            deployments = outcome.deployments.len(),
            created = outcome.created,
            discarded = outcome.skipped.len(),
            "Correlated workflow runs"
        );
        Ok(outcome)
    }
}

fn run_deployment(ctx: &ScanContext, commit: &Commit, run: WorkflowRun) -> NewDeployment {
    NewDeployment {
        repository_id: ctx.repository.id,
        branch_id: ctx.branch.id,
        commit_id: commit.id,
        commit_sha: commit.sha.clone(),
        name: run.name.unwrap_or_else(|| UNNAMED_RUN.to_string()),
        status: run.conclusion.unwrap_or_else(|| status::UNKNOWN.to_string()),
        started_at: commit.timestamp,
        finished_at: Some(run.updated_at),
        provenance: Provenance::Observed,
    }
    .normalized()
}
