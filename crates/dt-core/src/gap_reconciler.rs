// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Gap reconciliation
//!
//! A commit with no observed deployment of its own shipped with the first
//! observed deployment that started strictly after it. The reconciler
//! synthesizes an inferred deployment for each such commit, copying name,
//! status and `finished_at` from that target and starting at the commit's
//! own timestamp.
//!
//! Commits newer than the latest observed deployment have not shipped yet
//! and are left without a deployment.

use crate::{Error, Result, ScanStep};
use dt_domain_types::{Commit, Deployment, NewDeployment, Provenance};
use dt_store::TimelineStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Deployments to synthesize for one branch; computed without I/O
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapPlan {
    /// One inferred deployment per attributed commit, oldest commit first
    pub inferred: Vec<NewDeployment>,
    /// SHAs of unmatched commits with no later observed deployment
    pub unshipped: Vec<String>,
    /// Observed and inferred deployments merged in `started_at` order
    pub timeline: Vec<NewDeployment>,
}

/// Plan inferred deployments for every commit not in `matched`.
///
/// Observed deployments are stably sorted by `started_at`. Unmatched
/// commits are visited in `(timestamp, sha)` order. Only observed
/// deployments are attribution targets.
pub fn plan_gaps(
    observed: &[Deployment],
    commits: &[Commit],
    matched: &HashSet<String>,
) -> GapPlan {
    let mut sorted: Vec<&Deployment> = observed.iter().collect();
    sorted.sort_by_key(|deployment| deployment.started_at);

    let mut unmatched: Vec<&Commit> =
        commits.iter().filter(|commit| !matched.contains(&commit.sha)).collect();
    unmatched.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.sha.cmp(&b.sha)));

    let mut plan = GapPlan::default();
    for commit in unmatched {
        let target_index =
            sorted.partition_point(|deployment| deployment.started_at <= commit.timestamp);
        let Some(target) = sorted.get(target_index) else {
            tracing::debug!(
                sha = %commit.sha,
                timestamp = %commit.timestamp,
                "No observed deployment after commit, leaving it unshipped"
            );
            plan.unshipped.push(commit.sha.clone());
            continue;
        };

        tracing::debug!(
            sha = %commit.sha,
            target = %target.commit_sha,
            name = %target.name,
            "Attributing commit to later deployment"
        );
        plan.inferred.push(
            NewDeployment {
                repository_id: target.repository_id,
                branch_id: target.branch_id,
                commit_id: commit.id,
                commit_sha: commit.sha.clone(),
                name: target.name.clone(),
                status: target.status.clone(),
                started_at: commit.timestamp,
                finished_at: target.finished_at,
                provenance: Provenance::Inferred,
            }
            .normalized(),
        );
    }

    plan.timeline = sorted.into_iter().map(NewDeployment::from).collect();
    for inferred in &plan.inferred {
        let position = plan
            .timeline
            .partition_point(|deployment| deployment.started_at <= inferred.started_at);
        plan.timeline.insert(position, inferred.clone());
    }
    plan
}

/// What a reconciliation pass persisted
#[derive(Debug, Clone, Default)]
pub struct GapOutcome {
    pub plan: GapPlan,
    /// Inferred rows written; natural keys that already existed are not counted
    pub created: usize,
}

pub struct GapReconciler {
    store: Arc<dyn TimelineStore>,
}

impl GapReconciler {
    pub fn new(store: Arc<dyn TimelineStore>) -> Self {
        Self { store }
    }

    /// Plan and persist inferred deployments in a single batch
    pub async fn reconcile(
        &self,
        observed: &[Deployment],
        commits: &[Commit],
        matched: &HashSet<String>,
    ) -> Result<GapOutcome> {
        let plan = plan_gaps(observed, commits, matched);
        let created = if plan.inferred.is_empty() {
            0
        } else {
            self.store
                .insert_deployments(&plan.inferred)
                .await
                .map_err(Error::persistence(ScanStep::GapReconciliation))?
        };

        tracing::info!(
            inferred = plan.inferred.len(),
            created,
            unshipped = plan.unshipped.len(),
            "Reconciled unmatched commits"
        );
        Ok(GapOutcome { plan, created })
    }
}
