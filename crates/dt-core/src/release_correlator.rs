// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Release correlation
//!
//! A release names a tag, the tag names a commit. When both hops resolve
//! inside the indexed commit set, the release becomes a successful observed
//! deployment finishing at its publication time.

use crate::engine::ScanContext;
use crate::{CorrelationOutcome, Error, ReferenceKind, Result, ScanStep, Skipped};
use dt_domain_types::{status, Commit, NewDeployment, Provenance};
use dt_source_client::{Release, SourceClient, Tag};
use dt_store::TimelineStore;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ReleaseCorrelator {
    source: Arc<dyn SourceClient>,
    store: Arc<dyn TimelineStore>,
    max_concurrency: usize,
}

impl ReleaseCorrelator {
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
    ) -> Result<CorrelationOutcome> {
        let (tags, releases) = tokio::join!(
            self.source.list_tags(&ctx.repo),
            self.source.list_releases(&ctx.repo)
        );
        let (tags, releases) = match (tags, releases) {
            (Ok(tags), Ok(releases)) => (tags, releases),
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!(
                    repo = %ctx.repo,
                    error = %err,
                    "Tags or releases unavailable, correlating zero releases"
                );
                return Ok(CorrelationOutcome::degraded());
            }
        };
        if releases.is_empty() {
            tracing::info!(repo = %ctx.repo, "No releases found");
            return Ok(CorrelationOutcome::default());
        }

        let tags_by_name: HashMap<&str, &Tag> =
            tags.iter().map(|tag| (tag.name.as_str(), tag)).collect();
        let commits_by_sha: HashMap<&str, &Commit> =
            commits.iter().map(|commit| (commit.sha.as_str(), commit)).collect();

        let mut outcome = CorrelationOutcome::default();
        let mut pending = Vec::new();
        for release in &releases {
            let Some(tag) = tags_by_name.get(release.tag_name.as_str()) else {
                tracing::debug!(tag = %release.tag_name, "Release tag not found");
                outcome.skipped.push(Skipped::unresolved(
                    &release.tag_name,
                    ReferenceKind::ReleaseTag,
                    &release.tag_name,
                ));
                continue;
            };
            let Some(commit) = commits_by_sha.get(tag.target_sha.as_str()) else {
                tracing::debug!(
                    tag = %tag.name,
                    sha = %tag.target_sha,
                    "Release points at a commit outside the indexed set"
                );
                outcome.skipped.push(Skipped::unresolved(
                    &release.tag_name,
                    ReferenceKind::TagTarget,
                    &tag.target_sha,
                ));
                continue;
            };
            pending.push(release_deployment(ctx, commit, release));
        }

        let stored: Vec<_> = stream::iter(pending)
            .map(|deployment| async move {
                self.store
                    .get_or_create_deployment(&deployment)
                    .await
                    .map_err(Error::persistence(ScanStep::ReleaseCorrelation))
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;
        for stored in stored {
            let stored = stored?;
            outcome.push(stored.record, stored.created);
        }

        tracing::info!(
            releases = releases.len(),
            deployments = outcome.deployments.len(),
            created = outcome.created,
            unresolved = outcome.skipped.len(),
            "Correlated releases"
        );
        Ok(outcome)
    }
}

/// Release display name, falling back to the tag when the release is unnamed
fn release_name(release: &Release) -> String {
    release
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(release.tag_name.as_str())
        .to_string()
}

fn release_deployment(ctx: &ScanContext, commit: &Commit, release: &Release) -> NewDeployment {
    NewDeployment {
        repository_id: ctx.repository.id,
        branch_id: ctx.branch.id,
        commit_id: commit.id,
        commit_sha: commit.sha.clone(),
        name: release_name(release),
        status: status::SUCCESS.to_string(),
        started_at: commit.timestamp,
        finished_at: release.published_at,
        provenance: Provenance::Observed,
    }
    .normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use dt_domain_types::{NewCommit, RepoRef, RepositoryMetadata};
    use dt_source_client::{Endpoint, StaticSourceClient};
    use dt_store::InMemoryTimelineStore;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 4, hour, 0, 0).unwrap()
    }

    fn metadata() -> RepositoryMetadata {
        RepositoryMetadata {
            private: false,
            default_branch: "main".into(),
        }
    }

    fn tag(name: &str, sha: &str) -> Tag {
        Tag {
            name: name.into(),
            target_sha: sha.into(),
        }
    }

    fn release(tag_name: &str, name: Option<&str>, published: Option<u32>) -> Release {
        Release {
            tag_name: tag_name.into(),
            name: name.map(str::to_string),
            published_at: published.map(at),
        }
    }

    async fn fixture() -> (Arc<InMemoryTimelineStore>, ScanContext, Vec<Commit>) {
        let store = Arc::new(InMemoryTimelineStore::new());
        let repo = RepoRef::new("acme", "shop");
        let repository = store.get_or_create_repository(&repo, &metadata()).await.unwrap().record;
        let branch = store.get_or_create_branch(&repository, "main").await.unwrap().record;
        let new_commit = NewCommit {
            sha: "c0ffee".into(),
            author: None,
            message: None,
            timestamp: at(9),
        };
        let commit = store.get_or_create_commit(&branch, &new_commit).await.unwrap().record;
        let ctx = ScanContext {
            repo,
            repository,
            branch,
        };
        (store, ctx, vec![commit])
    }

    #[test]
    fn unnamed_release_falls_back_to_tag() {
        assert_eq!(release_name(&release("v1.0.0", None, None)), "v1.0.0");
        assert_eq!(release_name(&release("v1.0.0", Some("  "), None)), "v1.0.0");
        assert_eq!(release_name(&release("v1.0.0", Some("Spring"), None)), "Spring");
    }

    #[tokio::test]
    async fn release_resolves_through_tag_to_commit() {
        let (store, ctx, commits) = fixture().await;
        let source = Arc::new(
            StaticSourceClient::new(metadata())
                .with_tags(vec![tag("v1.0.0", "c0ffee")])
                .with_releases(vec![release("v1.0.0", Some("First"), Some(12))]),
        );

        let outcome = ReleaseCorrelator::new(source, store, 2)
            .correlate(&ctx, &commits)
            .await
            .unwrap();

        assert_eq!(outcome.deployments.len(), 1);
        let deployment = &outcome.deployments[0];
        assert_eq!(deployment.name, "First");
        assert_eq!(deployment.status, status::SUCCESS);
        assert_eq!(deployment.started_at, at(9));
        assert_eq!(deployment.finished_at, Some(at(12)));
        assert_eq!(deployment.duration_secs, Some(3 * 3600));
        assert!(outcome.matched.contains("c0ffee"));
    }

    #[tokio::test]
    async fn unresolved_hops_are_skipped() {
        let (store, ctx, commits) = fixture().await;
        let source = Arc::new(
            StaticSourceClient::new(metadata())
                .with_tags(vec![tag("v2.0.0", "deadbeef")])
                .with_releases(vec![
                    release("v1.9.0", None, Some(10)),
                    release("v2.0.0", None, Some(11)),
                ]),
        );

        let outcome = ReleaseCorrelator::new(source, store, 2)
            .correlate(&ctx, &commits)
            .await
            .unwrap();

        assert!(outcome.deployments.is_empty());
        assert_eq!(
            outcome.skipped,
            vec![
                Skipped::unresolved("v1.9.0", ReferenceKind::ReleaseTag, "v1.9.0"),
                Skipped::unresolved("v2.0.0", ReferenceKind::TagTarget, "deadbeef"),
            ]
        );
    }

    #[tokio::test]
    async fn failing_tag_listing_degrades_the_pass() {
        let (store, ctx, commits) = fixture().await;
        let source = Arc::new(
            StaticSourceClient::new(metadata())
                .with_tags(vec![tag("v1.0.0", "c0ffee")])
                .with_releases(vec![release("v1.0.0", None, Some(12))]),
        );
        source.set_failing(Endpoint::Tags, true);

        let outcome = ReleaseCorrelator::new(source, store, 2)
            .correlate(&ctx, &commits)
            .await
            .unwrap();
        assert!(outcome.degraded);
        assert!(outcome.deployments.is_empty());
    }
}
