// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-step outcomes: what was produced and what was skipped, and why

use dt_domain_types::Deployment;
use std::collections::HashSet;
use std::fmt;

/// Which reference could not be resolved against the indexed commit set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// A workflow run's head SHA
    WorkflowRunHead,
    /// A release's tag name
    ReleaseTag,
    /// A tag's target SHA
    TagTarget,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::WorkflowRunHead => f.write_str("workflow run head"),
            ReferenceKind::ReleaseTag => f.write_str("release tag"),
            ReferenceKind::TagTarget => f.write_str("tag target"),
        }
    }
}

/// Why an item was left out of the timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The item lacks a field the timeline cannot do without
    MissingRequiredField { field: &'static str },
    /// The item points outside the indexed commit set
    UnresolvedReference {
        kind: ReferenceKind,
        reference: String,
    },
}

/// An item recovered by exclusion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Identifies the skipped item: a commit SHA, run name or release tag
    pub subject: String,
    pub reason: SkipReason,
}

impl Skipped {
    pub fn missing_field(subject: impl Into<String>, field: &'static str) -> Self {
        Self {
            subject: subject.into(),
            reason: SkipReason::MissingRequiredField { field },
        }
    }

    pub fn unresolved(
        subject: impl Into<String>,
        kind: ReferenceKind,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            reason: SkipReason::UnresolvedReference {
                kind,
                reference: reference.into(),
            },
        }
    }
}

/// Result of one correlation pass
#[derive(Debug, Clone, Default)]
pub struct CorrelationOutcome {
    /// Observed deployments, unique and in source order
    pub deployments: Vec<Deployment>,
    /// SHAs of commits that now have an observed deployment
    pub matched: HashSet<String>,
    /// Deployment rows written by this pass
    pub created: usize,
    pub skipped: Vec<Skipped>,
    /// The source was unavailable and the pass ran on zero results
    pub degraded: bool,
}

impl CorrelationOutcome {
    pub(crate) fn degraded() -> Self {
        Self {
            degraded: true,
            ..Default::default()
        }
    }

    pub(crate) fn push(&mut self, deployment: Deployment, created: bool) {
        self.matched.insert(deployment.commit_sha.clone());
        if created {
            self.created += 1;
        }
        if !self.deployments.iter().any(|known| known.id == deployment.id) {
            self.deployments.push(deployment);
        }
    }
}
