// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scan orchestration
//!
//! [`ReconcileEngine::reconcile`] runs one scan of one branch:
//! resolve the repository and branch, index commits, correlate workflow
//! runs and releases concurrently, then reconcile the remaining gaps.
//! Re-running a scan over unchanged source data writes nothing.

use crate::commit_indexer::CommitIndexer;
use crate::gap_reconciler::GapReconciler;
use crate::progress::{Milestone, ProgressReporter};
use crate::release_correlator::ReleaseCorrelator;
use crate::workflow_correlator::WorkflowRunCorrelator;
use crate::{CorrelationOutcome, Error, Result, ScanStep};
use dt_domain_types::{Branch, RepoRef, Repository, RunFilter, ScanSummary};
use dt_source_client::SourceClient;
use dt_store::TimelineStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Concurrent source/store requests per step unless configured otherwise
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// The repository and branch a scan runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanContext {
    pub repo: RepoRef,
    pub repository: Repository,
    pub branch: Branch,
}

pub struct ReconcileEngine {
    source: Arc<dyn SourceClient>,
    store: Arc<dyn TimelineStore>,
    max_concurrency: usize,
}

impl ReconcileEngine {
    pub fn new(source: Arc<dyn SourceClient>, store: Arc<dyn TimelineStore>) -> Self {
        Self {
            source,
            store,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Reconcile the deployment timeline of one branch.
    ///
    /// With no `branch`, the repository's default branch is scanned.
    /// Only an unavailable repository lookup or a failed write aborts the
    /// scan; everything else is recovered and counted in the summary. When a
    /// correlation listing was unavailable, no deployments are inferred and
    /// the summary is marked `degraded`.
    pub async fn reconcile(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
        filter: &RunFilter,
        progress: &dyn ProgressReporter,
    ) -> Result<ScanSummary> {
        tracing::info!(
            %repo,
            branch = branch.unwrap_or("<default>"),
            source = self.source.description(),
            filtered = !filter.is_empty(),
            "Starting timeline scan"
        );
        let ctx = self.resolve_context(repo, branch).await?;
        let mut summary = ScanSummary::default();

        let indexer = CommitIndexer::new(
            self.source.clone(),
            self.store.clone(),
            self.max_concurrency,
        );
        let index = indexer.index(&ctx).await?;
        summary.commits_indexed = index.commits.len();
        summary.commits_created = index.created;
        summary.skipped += index.skipped.len();
        summary.degraded = index.degraded;
        progress.report(Milestone::CommitsIndexed, &summary).await;

        let workflows = WorkflowRunCorrelator::new(
            self.source.clone(),
            self.store.clone(),
            self.max_concurrency,
        );
        let releases = ReleaseCorrelator::new(
            self.source.clone(),
            self.store.clone(),
            self.max_concurrency,
        );
        let (from_runs, from_releases) = tokio::join!(
            workflows.correlate(&ctx, &index.commits, filter),
            releases.correlate(&ctx, &index.commits)
        );
        let observed = merge_observed(from_runs?, from_releases?);
        summary.deployments_observed = observed.deployments.len();
        summary.deployments_created = observed.created;
        summary.skipped += observed.skipped.len();
        summary.degraded |= observed.degraded;
        progress.report(Milestone::Correlated, &summary).await;

        // Commits with an unseen observed deployment would be re-attributed
        if observed.degraded {
            tracing::warn!(
                %repo,
                branch = %ctx.branch.name,
                "Observed deployments are incomplete, skipping gap reconciliation"
            );
        } else {
            let gaps = GapReconciler::new(self.store.clone())
                .reconcile(&observed.deployments, &index.commits, &observed.matched)
                .await?;
            summary.deployments_inferred = gaps.plan.inferred.len();
            summary.deployments_created += gaps.created;
            summary.commits_unshipped = gaps.plan.unshipped.len();
        }
        progress.report(Milestone::Reconciled, &summary).await;

        tracing::info!(
            %repo,
            branch = %ctx.branch.name,
            commits = summary.commits_indexed,
            observed = summary.deployments_observed,
            inferred = summary.deployments_inferred,
            created = summary.deployments_created,
            unshipped = summary.commits_unshipped,
            skipped = summary.skipped,
            degraded = summary.degraded,
            "Timeline scan complete"
        );
        Ok(summary)
    }

    async fn resolve_context(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
    ) -> Result<ScanContext> {
        let repository = match self
            .store
            .find_repository(repo)
            .await
            .map_err(Error::persistence(ScanStep::Repository))?
        {
            Some(repository) => repository,
            None => {
                let metadata = self.source.get_repository(repo).await.map_err(|source| {
                    Error::Source {
                        step: ScanStep::Repository,
                        source,
                    }
                })?;
                let stored = self
                    .store
                    .get_or_create_repository(repo, &metadata)
                    .await
                    .map_err(Error::persistence(ScanStep::Repository))?;
                if stored.created {
                    tracing::info!(
                        %repo,
                        default_branch = %metadata.default_branch,
                        "Registered repository"
                    );
                }
                stored.record
            }
        };

        let branch_name = branch.unwrap_or(repository.default_branch.as_str()).to_string();
        let branch = self
            .store
            .get_or_create_branch(&repository, &branch_name)
            .await
            .map_err(Error::persistence(ScanStep::Branch))?
            .record;

        Ok(ScanContext {
            repo: repo.clone(),
            repository,
            branch,
        })
    }
}

/// Combine both correlation passes into one observed set, unique by row id
fn merge_observed(
    mut runs: CorrelationOutcome,
    releases: CorrelationOutcome,
) -> CorrelationOutcome {
    let mut seen: HashSet<i64> = runs.deployments.iter().map(|d| d.id).collect();
    for deployment in releases.deployments {
        if seen.insert(deployment.id) {
            runs.deployments.push(deployment);
        }
    }
    runs.matched.extend(releases.matched);
    runs.created += releases.created;
    runs.skipped.extend(releases.skipped);
    runs.degraded |= releases.degraded;
    runs
}
