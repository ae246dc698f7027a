// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Subcommand implementations

use crate::cli::{ScanArgs, TimelineArgs};
use crate::config::WorkerConfig;
use anyhow::Context;
use dt_core::{ReconcileEngine, TracingProgress};
use dt_domain_types::{Deployment, RepoRef, ScanSummary};
use dt_logging::redact;
use dt_source_client::{GithubClient, SourceClient};
use dt_store::{SqliteTimelineStore, TimelineStore};
use std::sync::Arc;

pub fn open_store(config: &WorkerConfig) -> anyhow::Result<SqliteTimelineStore> {
    if config.is_in_memory() {
        return SqliteTimelineStore::open_in_memory().context("Failed to open in-memory database");
    }
    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory {}", parent.display())
        })?;
    }
    SqliteTimelineStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path))
}

pub fn github_client(config: &WorkerConfig) -> anyhow::Result<GithubClient> {
    let client = GithubClient::new(config.api_url()?, config.token.as_deref())
        .context("Failed to build API client")?
        .with_per_page(config.per_page);
    tracing::debug!(
        api_url = %client.base_url(),
        per_page = client.per_page(),
        token = config.token.as_deref().map(redact),
        "Configured API client"
    );
    Ok(client)
}

/// Run one scan with the given source and store
pub async fn run_scan(
    source: Arc<dyn SourceClient>,
    store: Arc<dyn TimelineStore>,
    config: &WorkerConfig,
    args: &ScanArgs,
) -> anyhow::Result<ScanSummary> {
    let engine = ReconcileEngine::new(source, store).with_max_concurrency(config.max_concurrency);
    engine
        .reconcile(&args.repo, args.branch.as_deref(), &args.run_filter(), &TracingProgress)
        .await
        .map_err(|err| {
            tracing::error!(repo = %args.repo, step = %err.step(), error = %err, "Scan failed");
            err
        })
        .with_context(|| format!("Scan of {} failed", args.repo))
}

pub async fn scan(args: &ScanArgs) -> anyhow::Result<ScanSummary> {
    let config =
        WorkerConfig::resolve(args.connection.config.as_deref(), args.connection.overrides())?;
    let source = Arc::new(github_client(&config)?);
    let store = Arc::new(open_store(&config)?);
    run_scan(source, store, &config, args).await
}

/// Stored deployments of a branch in timeline order
pub async fn read_timeline(
    store: &dyn TimelineStore,
    repo: &RepoRef,
    branch: Option<&str>,
) -> anyhow::Result<Vec<Deployment>> {
    let repository = store
        .find_repository(repo)
        .await?
        .with_context(|| format!("Repository {repo} has not been scanned yet"))?;
    let branch_name = branch.unwrap_or(repository.default_branch.as_str());
    let branch = store
        .find_branch(&repository, branch_name)
        .await?
        .with_context(|| format!("Branch {branch_name} of {repo} has not been scanned yet"))?;
    Ok(store.list_deployments(&branch).await?)
}

pub async fn timeline(args: &TimelineArgs) -> anyhow::Result<Vec<Deployment>> {
    let config =
        WorkerConfig::resolve(args.connection.config.as_deref(), args.connection.overrides())?;
    let store = open_store(&config)?;
    read_timeline(&store, &args.repo, args.branch.as_deref()).await
}
