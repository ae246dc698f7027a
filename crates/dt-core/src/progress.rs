// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scan progress checkpoints reported to the job runner

use async_trait::async_trait;
use dt_domain_types::ScanSummary;

/// Points in a scan at which progress is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    CommitsIndexed,
    Correlated,
    Reconciled,
}

impl Milestone {
    pub fn percent(self) -> u8 {
        match self {
            Milestone::CommitsIndexed => 50,
            Milestone::Correlated => 75,
            Milestone::Reconciled => 100,
        }
    }
}

/// Receives progress checkpoints; implementations must not fail the scan
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, milestone: Milestone, summary: &ScanSummary);
}

/// Discards every checkpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

#[async_trait]
impl ProgressReporter for NoopProgress {
    async fn report(&self, _milestone: Milestone, _summary: &ScanSummary) {}
}

/// Logs each checkpoint at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

#[async_trait]
impl ProgressReporter for TracingProgress {
    async fn report(&self, milestone: Milestone, summary: &ScanSummary) {
        tracing::info!(
            percent = milestone.percent(),
            ?milestone,
            commits_indexed = summary.commits_indexed,
            deployments_observed = summary.deployments_observed,
            deployments_inferred = summary.deployments_inferred,
            "Scan progress"
        );
    }
}
