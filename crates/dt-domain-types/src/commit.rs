// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Commit domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit ready to be indexed. The timestamp is mandatory: commits
/// without one never reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommit {
    pub sha: String,
    pub author: Option<String>,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Persisted commit record, unique per (repository, branch, sha)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: i64,
    pub repository_id: i64,
    pub branch_id: i64,
    pub sha: String,
    pub author: Option<String>,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}
