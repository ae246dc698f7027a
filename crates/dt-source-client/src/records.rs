// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Records returned by a [`crate::SourceClient`]
//!
//! These mirror the semantic contract of the host API rather than its wire
//! format. Fields the host may omit are optional here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit as listed by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCommit {
    pub sha: String,
    pub author: Option<String>,
    pub message: Option<String>,
    /// Committer date; commits without one cannot be placed on the timeline
    pub committed_at: Option<DateTime<Utc>>,
}

/// One execution of a CI workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub name: Option<String>,
    pub head_sha: String,
    /// `None` while the run is still in progress
    pub conclusion: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named pointer to a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub target_sha: String,
}

/// A published release attached to a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}
