// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use chrono::{TimeZone, Utc};
use clap::Parser;
use dt_domain_types::{Provenance, RepoRef, RepositoryMetadata};
use dt_source_client::{SourceCommit, StaticSourceClient, WorkflowRun};
use dt_store::{SqliteTimelineStore, TimelineStore};
use dt_worker::{commands, Cli, Command, ConfigOverrides, WorkerConfig};
use std::sync::Arc;

fn fixture_source() -> StaticSourceClient {
    let at = |hour| Utc.with_ymd_and_hms(2024, 4, 2, hour, 0, 0).unwrap();
    let commit = |sha: &str, hour| SourceCommit {
        sha: sha.into(),
        author: Some("dev".into()),
        message: None,
        committed_at: Some(at(hour)),
    };
    StaticSourceClient::new(RepositoryMetadata {
        private: false,
        default_branch: "main".into(),
    })
    .with_commits(vec![commit("one", 9), commit("two", 10), commit("three", 11)])
    .with_workflow_runs(vec![
        WorkflowRun {
            name: Some("Deploy production".into()),
            head_sha: "two".into(),
            conclusion: Some("success".into()),
            created_at: at(10),
            updated_at: at(10),
        },
        WorkflowRun {
            name: Some("CI".into()),
            head_sha: "three".into(),
            conclusion: Some("success".into()),
            created_at: at(11),
            updated_at: at(11),
        },
    ])
}

fn scan_args(extra: &[&str]) -> dt_worker::ScanArgs {
    let mut argv = vec!["dt-worker", "scan", "https://github.com/acme/storefront"];
    argv.extend_from_slice(extra);
    match Cli::try_parse_from(argv).unwrap().command {
        Command::Scan(args) => args,
        other => panic!("unexpected command {other:?}"),
    }
}

#[tokio::test]
async fn scan_persists_timeline_that_can_be_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let database = dir.path().join("timeline.sqlite3");
    let config = WorkerConfig::resolve(
        None,
        ConfigOverrides {
            database_path: Some(database.to_string_lossy().into_owned()),
            max_concurrency: Some(2),
            ..Default::default()
        },
    )
    .unwrap();
    let args = scan_args(&["--workflow-name", "deploy"]);

    let store = Arc::new(commands::open_store(&config).unwrap());
    let summary = commands::run_scan(Arc::new(fixture_source()), store, &config, &args)
        .await
        .unwrap();
    assert_eq!(summary.commits_indexed, 3);
    assert_eq!(summary.deployments_observed, 1);
    assert_eq!(summary.deployments_inferred, 1);
    assert_eq!(summary.commits_unshipped, 1);

    let reopened = SqliteTimelineStore::open(&database).unwrap();
    let timeline = commands::read_timeline(&reopened, &RepoRef::new("acme", "storefront"), None)
        .await
        .unwrap();
    let rows: Vec<_> = timeline
        .iter()
        .map(|d| (d.commit_sha.as_str(), d.provenance))
        .collect();
    assert_eq!(
        rows,
        vec![("one", Provenance::Inferred), ("two", Provenance::Observed)]
    );
    assert!(serde_json::to_string(&timeline).unwrap().contains("\"provenance\":\"inferred\""));
}

#[tokio::test]
async fn timeline_of_unknown_repository_is_an_error() {
    let store = SqliteTimelineStore::open_in_memory().unwrap();
    let err = commands::read_timeline(&store, &RepoRef::new("acme", "unknown"), Some("main"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("has not been scanned"));
}

#[tokio::test]
async fn timeline_of_unscanned_branch_writes_nothing() {
    let config = WorkerConfig::resolve(
        None,
        ConfigOverrides {
            database_path: Some(":memory:".into()),
            ..Default::default()
        },
    )
    .unwrap();
    let store = Arc::new(commands::open_store(&config).unwrap());
    commands::run_scan(Arc::new(fixture_source()), store.clone(), &config, &scan_args(&[]))
        .await
        .unwrap();
    let repo = RepoRef::new("acme", "storefront");

    let err = commands::read_timeline(store.as_ref(), &repo, Some("mian"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Branch mian of acme/storefront has not been scanned"));

    let repository = store.find_repository(&repo).await.unwrap().unwrap();
    assert!(store.find_branch(&repository, "mian").await.unwrap().is_none());
    assert!(store.find_branch(&repository, "main").await.unwrap().is_some());
}

#[tokio::test]
async fn failed_scan_names_the_step() {
    let config = WorkerConfig::resolve(
        None,
        ConfigOverrides {
            database_path: Some(":memory:".into()),
            ..Default::default()
        },
    )
    .unwrap();
    let source = fixture_source();
    source.set_failing(dt_source_client::Endpoint::Repository, true);
    let store = Arc::new(commands::open_store(&config).unwrap());

    let err = commands::run_scan(Arc::new(source), store, &config, &scan_args(&[]))
        .await
        .unwrap_err();

    let chain = format!("{err:#}");
    assert!(chain.contains("Scan of acme/storefront failed"));
    assert!(chain.contains("repository lookup failed"));
}
