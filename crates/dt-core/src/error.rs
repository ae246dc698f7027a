// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Engine error types
//!
//! Only conditions that abort a scan are errors. Recovered conditions
//! (missing commit timestamps, unresolved references, an unavailable source
//! for a correlator) are reported as [`crate::Skipped`] entries instead.

use dt_source_client::SourceError;
use dt_store::StoreError;
use std::fmt;
use thiserror::Error;

/// Steps of a scan, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanStep {
    Repository,
    Branch,
    CommitIndexing,
    WorkflowCorrelation,
    ReleaseCorrelation,
    GapReconciliation,
}

impl fmt::Display for ScanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanStep::Repository => "repository lookup",
            ScanStep::Branch => "branch setup",
            ScanStep::CommitIndexing => "commit indexing",
            ScanStep::WorkflowCorrelation => "workflow run correlation",
            ScanStep::ReleaseCorrelation => "release correlation",
            ScanStep::GapReconciliation => "gap reconciliation",
        };
        f.write_str(name)
    }
}

/// A scan step that could not complete
#[derive(Debug, Error)]
pub enum Error {
    #[error("{step} failed: source unavailable: {source}")]
    Source {
        step: ScanStep,
        #[source]
        source: SourceError,
    },

    #[error("{step} failed: persistence failure: {source}")]
    Persistence {
        step: ScanStep,
        #[source]
        source: StoreError,
    },
}

impl Error {
    pub fn persistence(step: ScanStep) -> impl FnOnce(StoreError) -> Self {
        move |source| Error::Persistence { step, source }
    }

    /// The step the scan stopped at
    pub fn step(&self) -> ScanStep {
        match self {
            Error::Source { step, .. } | Error::Persistence { step, .. } => *step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failed_step() {
        let err = Error::persistence(ScanStep::GapReconciliation)(StoreError::Rejected(
            "disk full".into(),
        ));
        assert_eq!(err.step(), ScanStep::GapReconciliation);
        assert_eq!(
            err.to_string(),
            "gap reconciliation failed: persistence failure: Write rejected: disk full"
        );
    }
}
