// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Deployment timeline reconciliation engine.
//!
//! Given a repository and branch, the engine reconstructs a chronologically
//! consistent history of deployments by correlating three noisy signals:
//! CI workflow runs, tag/release pairs and commits. Commits that match none
//! of them are attributed to the next later observed deployment.
//!
//! Data flows leaf-first:
//! source client -> [`CommitIndexer`] -> {[`WorkflowRunCorrelator`],
//! [`ReleaseCorrelator`]} (concurrently) -> [`GapReconciler`] -> store.
//! [`ReconcileEngine::reconcile`] drives one scan end-to-end.

pub mod commit_indexer;
pub mod engine;
pub mod error;
pub mod gap_reconciler;
pub mod outcome;
pub mod progress;
pub mod release_correlator;
pub mod workflow_correlator;

/// Core result type used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type; carries the scan step that failed.
pub use error::{Error, ScanStep};

pub use commit_indexer::{CommitIndexer, IndexOutcome};
pub use engine::{ReconcileEngine, ScanContext, DEFAULT_MAX_CONCURRENCY};
pub use gap_reconciler::{plan_gaps, GapOutcome, GapPlan, GapReconciler};
pub use outcome::{CorrelationOutcome, ReferenceKind, SkipReason, Skipped};
pub use progress::{Milestone, NoopProgress, ProgressReporter, TracingProgress};
pub use release_correlator::ReleaseCorrelator;
pub use workflow_correlator::WorkflowRunCorrelator;
