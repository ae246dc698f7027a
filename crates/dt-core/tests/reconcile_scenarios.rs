// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end scans against the static source and the in-memory store

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dt_core::{Milestone, NoopProgress, ProgressReporter, ReconcileEngine, ScanStep};
use dt_domain_types::{
    Branch, Deployment, Provenance, RepoRef, RepositoryMetadata, RunFilter, ScanSummary,
};
use dt_source_client::{
    Endpoint, Release, SourceCommit, StaticSourceClient, Tag, WorkflowRun,
};
use dt_store::{InMemoryTimelineStore, TimelineStore};
use std::sync::{Arc, Mutex};
use tracing_test::traced_test;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, hour, 0, 0).unwrap()
}

fn repo() -> RepoRef {
    RepoRef::new("acme", "storefront")
}

fn metadata() -> RepositoryMetadata {
    RepositoryMetadata {
        private: false,
        default_branch: "main".into(),
    }
}

fn commit(sha: &str, hour: u32) -> SourceCommit {
    SourceCommit {
        sha: sha.into(),
        author: Some("dev".into()),
        message: Some(format!("change {sha}")),
        committed_at: Some(at(hour)),
    }
}

fn run(name: &str, sha: &str, created_hour: u32, updated_hour: u32) -> WorkflowRun {
    WorkflowRun {
        name: Some(name.into()),
        head_sha: sha.into(),
        conclusion: Some("success".into()),
        created_at: at(created_hour),
        updated_at: at(updated_hour),
    }
}

/// D1 deploys at 10:00, D2 at 12:00; `gap` lands at 11:00 and `late` at 14:00
fn gap_source() -> StaticSourceClient {
    StaticSourceClient::new(metadata())
        .with_commits(vec![
            commit("late", 14),
            commit("d2", 12),
            commit("gap", 11),
            commit("d1", 10),
        ])
        .with_workflow_runs(vec![
            run("Deploy", "d1", 10, 10),
            run("Deploy", "d2", 12, 13),
        ])
}

async fn branch(store: &InMemoryTimelineStore, name: &str) -> Branch {
    let repository = store.find_repository(&repo()).await.unwrap().unwrap();
    store.get_or_create_branch(&repository, name).await.unwrap().record
}

async fn timeline(store: &InMemoryTimelineStore) -> Vec<Deployment> {
    let branch = branch(store, "main").await;
    store.list_deployments(&branch).await.unwrap()
}

#[derive(Default)]
struct RecordingProgress {
    seen: Mutex<Vec<(Milestone, ScanSummary)>>,
}

#[async_trait]
impl ProgressReporter for RecordingProgress {
    async fn report(&self, milestone: Milestone, summary: &ScanSummary) {
        self.seen.lock().unwrap().push((milestone, summary.clone()));
    }
}

#[tokio::test]
async fn gap_commit_is_attributed_to_next_deployment() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let engine = ReconcileEngine::new(Arc::new(gap_source()), store.clone());

    let summary = engine
        .reconcile(&repo(), Some("main"), &RunFilter::default(), &NoopProgress)
        .await
        .unwrap();

    assert_eq!(
        summary,
        ScanSummary {
            commits_indexed: 4,
            commits_created: 4,
            deployments_observed: 2,
            deployments_inferred: 1,
            deployments_created: 3,
            commits_unshipped: 1,
            skipped: 0,
            degraded: false,
        }
    );

    let deployments = timeline(&store).await;
    let order: Vec<_> = deployments.iter().map(|d| d.commit_sha.as_str()).collect();
    assert_eq!(order, vec!["d1", "gap", "d2"]);

    let inferred = &deployments[1];
    assert_eq!(inferred.provenance, Provenance::Inferred);
    assert_eq!(inferred.name, "Deploy");
    assert_eq!(inferred.started_at, at(11));
    assert_eq!(inferred.finished_at, Some(at(13)));
    assert_eq!(inferred.duration_secs, Some(2 * 3600));
    assert!(deployments.iter().all(|d| d.commit_sha != "late"));
}

#[tokio::test]
async fn rescanning_unchanged_data_writes_nothing() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let engine = ReconcileEngine::new(Arc::new(gap_source()), store.clone());
    let filter = RunFilter::default();

    engine.reconcile(&repo(), None, &filter, &NoopProgress).await.unwrap();
    let first = timeline(&store).await;
    let second_summary = engine.reconcile(&repo(), None, &filter, &NoopProgress).await.unwrap();
    let second = timeline(&store).await;

    assert_eq!(first, second);
    assert_eq!(second_summary.commits_created, 0);
    assert_eq!(second_summary.deployments_created, 0);
    assert_eq!(second_summary.deployments_observed, 2);
    assert_eq!(second_summary.deployments_inferred, 1);
}

#[tokio::test]
async fn releases_and_runs_share_one_timeline() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let source = StaticSourceClient::new(metadata())
        .with_commits(vec![commit("a", 8), commit("b", 9), commit("c", 12)])
        .with_workflow_runs(vec![run("Deploy", "a", 8, 8)])
        .with_tags(vec![Tag {
            name: "v1.0.0".into(),
            target_sha: "c".into(),
        }])
        .with_releases(vec![Release {
            tag_name: "v1.0.0".into(),
            name: None,
            published_at: Some(at(15)),
        }]);
    let engine = ReconcileEngine::new(Arc::new(source), store.clone()).with_max_concurrency(2);

    let summary = engine
        .reconcile(&repo(), None, &RunFilter::default(), &NoopProgress)
        .await
        .unwrap();
    assert_eq!(summary.deployments_observed, 2);
    assert_eq!(summary.deployments_inferred, 1);
    assert_eq!(summary.commits_unshipped, 0);

    let deployments = timeline(&store).await;
    let rows: Vec<_> = deployments
        .iter()
        .map(|d| (d.commit_sha.as_str(), d.name.as_str(), d.provenance))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("a", "Deploy", Provenance::Observed),
            ("b", "v1.0.0", Provenance::Inferred),
            ("c", "v1.0.0", Provenance::Observed),
        ]
    );
    assert_eq!(deployments[2].status, "success");
}

#[tokio::test]
#[traced_test]
async fn commit_without_timestamp_is_skipped_with_warning() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let mut undated = commit("undated", 9);
    undated.committed_at = None;
    let source = StaticSourceClient::new(metadata())
        .with_commits(vec![commit("d1", 10), undated])
        .with_workflow_runs(vec![run("Deploy", "d1", 10, 11), run("Deploy", "undated", 9, 9)]);
    let engine = ReconcileEngine::new(Arc::new(source), store.clone());

    let summary = engine
        .reconcile(&repo(), None, &RunFilter::default(), &NoopProgress)
        .await
        .unwrap();

    assert_eq!(summary.commits_indexed, 1);
    // the undated commit and the run pointing at it
    assert_eq!(summary.skipped, 2);
    assert!(logs_contain("Skipping commit without a timestamp"));
    let branch = branch(&store, "main").await;
    assert!(store.find_commit(&branch, "undated").await.unwrap().is_none());
}

#[tokio::test]
async fn run_for_unknown_commit_is_discarded() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let source = StaticSourceClient::new(metadata())
        .with_commits(vec![commit("d1", 10)])
        .with_workflow_runs(vec![run("Deploy", "d1", 10, 11), run("Deploy", "elsewhere", 12, 12)]);
    let engine = ReconcileEngine::new(Arc::new(source), store.clone());

    let summary = engine
        .reconcile(&repo(), None, &RunFilter::default(), &NoopProgress)
        .await
        .unwrap();

    assert_eq!(summary.deployments_observed, 1);
    assert_eq!(summary.skipped, 1);
    let branch = branch(&store, "main").await;
    assert!(store.find_commit(&branch, "elsewhere").await.unwrap().is_none());
}

#[tokio::test]
async fn name_filter_narrows_observed_deployments() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let source = gap_source();
    source.set_workflow_runs(vec![
        run("Deploy", "d2", 12, 13),
        run("Lint", "d1", 10, 10),
    ]);
    let engine = ReconcileEngine::new(Arc::new(source), store.clone());
    let filter = RunFilter {
        name_pattern: Some("deploy".into()),
        ..Default::default()
    };

    let summary = engine.reconcile(&repo(), None, &filter, &NoopProgress).await.unwrap();

    assert_eq!(summary.deployments_observed, 1);
    // d1 and gap both ride along with the 12:00 deployment
    assert_eq!(summary.deployments_inferred, 2);
    assert_eq!(summary.commits_unshipped, 1);
}

#[tokio::test]
async fn unavailable_run_listing_still_completes_scan() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let source = gap_source();
    source.set_failing(Endpoint::WorkflowRuns, true);
    let engine = ReconcileEngine::new(Arc::new(source), store.clone());

    let summary = engine
        .reconcile(&repo(), None, &RunFilter::default(), &NoopProgress)
        .await
        .unwrap();

    assert_eq!(summary.commits_indexed, 4);
    assert_eq!(summary.deployments_observed, 0);
    assert_eq!(summary.deployments_inferred, 0);
    assert_eq!(summary.commits_unshipped, 0);
    assert!(summary.degraded);
    assert!(timeline(&store).await.is_empty());
}

#[tokio::test]
#[traced_test]
async fn rescan_with_unavailable_runs_keeps_existing_timeline() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let source = StaticSourceClient::new(metadata())
        .with_commits(vec![commit("c1", 9), commit("c2", 10), commit("c3", 11)])
        .with_workflow_runs(vec![
            run("Deploy", "c1", 9, 9),
            run("Deploy", "c3", 11, 12),
        ])
        .with_tags(vec![Tag {
            name: "v1".into(),
            target_sha: "c3".into(),
        }])
        .with_releases(vec![Release {
            tag_name: "v1".into(),
            name: None,
            published_at: Some(at(12)),
        }]);
    let source = Arc::new(source);
    let engine = ReconcileEngine::new(source.clone(), store.clone());
    let filter = RunFilter::default();

    let first = engine.reconcile(&repo(), None, &filter, &NoopProgress).await.unwrap();
    assert!(!first.degraded);
    let before = timeline(&store).await;

    source.set_failing(Endpoint::WorkflowRuns, true);
    let second = engine.reconcile(&repo(), None, &filter, &NoopProgress).await.unwrap();

    assert!(second.degraded);
    assert_eq!(second.deployments_observed, 1);
    assert_eq!(second.deployments_inferred, 0);
    assert_eq!(second.deployments_created, 0);
    let after = timeline(&store).await;
    assert_eq!(after, before);
    assert!(!after
        .iter()
        .any(|d| d.commit_sha == "c1" && d.provenance == Provenance::Inferred));
    assert!(logs_contain("skipping gap reconciliation"));
}

#[tokio::test]
async fn unavailable_repository_lookup_aborts_scan() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let source = gap_source();
    source.set_failing(Endpoint::Repository, true);
    let engine = ReconcileEngine::new(Arc::new(source), store.clone());

    let err = engine
        .reconcile(&repo(), None, &RunFilter::default(), &NoopProgress)
        .await
        .unwrap_err();

    assert_eq!(err.step(), ScanStep::Repository);
    assert!(matches!(err, dt_core::Error::Source { .. }));
    assert!(store.find_repository(&repo()).await.unwrap().is_none());
}

#[tokio::test]
async fn rejected_writes_report_the_failed_step() {
    let store = Arc::new(InMemoryTimelineStore::new());
    store.set_reject_writes(true);
    let engine = ReconcileEngine::new(Arc::new(gap_source()), store.clone());

    let err = engine
        .reconcile(&repo(), None, &RunFilter::default(), &NoopProgress)
        .await
        .unwrap_err();
    assert_eq!(err.step(), ScanStep::Repository);
    assert!(matches!(err, dt_core::Error::Persistence { .. }));
}

#[tokio::test]
async fn failed_inference_write_reports_gap_reconciliation() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let source = gap_source();
    source.set_workflow_runs(vec![
        run("Deploy", "d1", 10, 10),
        run("Smoke", "gap", 11, 11),
        run("Deploy", "d2", 12, 13),
    ]);
    let source = Arc::new(source);
    let engine = ReconcileEngine::new(source.clone(), store.clone());
    engine
        .reconcile(&repo(), None, &RunFilter::default(), &NoopProgress)
        .await
        .unwrap();

    // Every row now exists; narrowing the filter leaves `gap` to be inferred
    store.set_reject_writes(true);
    let filter = RunFilter {
        name_pattern: Some("deploy".into()),
        ..Default::default()
    };
    let err = engine
        .reconcile(&repo(), None, &filter, &NoopProgress)
        .await
        .unwrap_err();

    assert_eq!(err.step(), ScanStep::GapReconciliation);
}

#[tokio::test]
async fn default_branch_is_scanned_when_none_given() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let source = StaticSourceClient::new(RepositoryMetadata {
        private: true,
        default_branch: "trunk".into(),
    })
    .with_commits(vec![commit("d1", 10)])
    .with_workflow_runs(vec![run("Deploy", "d1", 10, 10)]);
    let engine = ReconcileEngine::new(Arc::new(source), store.clone());

    engine
        .reconcile(&repo(), None, &RunFilter::default(), &NoopProgress)
        .await
        .unwrap();

    let trunk = branch(&store, "trunk").await;
    assert_eq!(store.list_deployments(&trunk).await.unwrap().len(), 1);
    let repository = store.find_repository(&repo()).await.unwrap().unwrap();
    assert!(repository.private);
    assert_eq!(repository.default_branch, "trunk");
}

#[tokio::test]
async fn progress_is_reported_at_each_milestone() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let engine = ReconcileEngine::new(Arc::new(gap_source()), store);
    let progress = RecordingProgress::default();

    engine
        .reconcile(&repo(), None, &RunFilter::default(), &progress)
        .await
        .unwrap();

    let seen = progress.seen.lock().unwrap();
    let milestones: Vec<_> = seen.iter().map(|(m, _)| m.percent()).collect();
    assert_eq!(milestones, vec![50, 75, 100]);
    assert_eq!(seen[0].1.commits_indexed, 4);
    assert_eq!(seen[0].1.deployments_observed, 0);
    assert_eq!(seen[2].1.deployments_inferred, 1);
}
