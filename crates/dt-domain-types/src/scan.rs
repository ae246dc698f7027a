// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scan parameters and results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Restricts which workflow runs count as deployments
///
/// All constraints are optional; an omitted bound is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFilter {
    /// Case-insensitive substring the run name must contain
    pub name_pattern: Option<String>,
    /// Inclusive lower bound on run creation time
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on run creation time
    pub until: Option<DateTime<Utc>>,
}

impl RunFilter {
    pub fn is_empty(&self) -> bool {
        self.name_pattern.is_none() && self.since.is_none() && self.until.is_none()
    }

    pub fn matches(&self, run_name: Option<&str>, created_at: DateTime<Utc>) -> bool {
        let name_matches = match &self.name_pattern {
            Some(pattern) => run_name
                .map(|name| name.to_lowercase().contains(&pattern.to_lowercase()))
                .unwrap_or(false),
            None => true,
        };
        let since_matches = self.since.map_or(true, |since| created_at >= since);
        let until_matches = self.until.map_or(true, |until| created_at <= until);

        name_matches && since_matches && until_matches
    }
}

/// Counters reported back to the job runner after a scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Size of the deduplicated commit set for the branch
    pub commits_indexed: usize,
    /// Commit rows written by this scan
    pub commits_created: usize,
    /// Deployments matched by the workflow and release correlators
    pub deployments_observed: usize,
    /// Deployments synthesized by the gap reconciler
    pub deployments_inferred: usize,
    /// Deployment rows written by this scan, observed and inferred
    pub deployments_created: usize,
    /// Unmatched commits newer than every known deployment
    pub commits_unshipped: usize,
    /// Items recovered by exclusion (missing fields, unresolved references)
    pub skipped: usize,
    /// A source listing was unavailable and its step ran on zero results
    #[serde(default)]
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let filter = RunFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(None, at(1)));
        assert!(filter.matches(Some("Build"), at(20)));
    }

    #[test]
    fn name_pattern_is_case_insensitive_substring() {
        let filter = RunFilter {
            name_pattern: Some("DEPLOY".into()),
            ..Default::default()
        };
        assert!(filter.matches(Some("Deploy to production"), at(1)));
        assert!(filter.matches(Some("pre-deploy checks"), at(1)));
        assert!(!filter.matches(Some("Unit tests"), at(1)));
        assert!(!filter.matches(None, at(1)));
    }

    #[test]
    fn time_window_is_inclusive() {
        let filter = RunFilter {
            name_pattern: None,
            since: Some(at(5)),
            until: Some(at(10)),
        };
        assert!(filter.matches(None, at(5)));
        assert!(filter.matches(None, at(10)));
        assert!(!filter.matches(None, at(4)));
        assert!(!filter.matches(None, at(11)));
    }
}
