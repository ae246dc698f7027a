// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Domain types for the deployment timeline
//!
//! This crate contains the entities shared by the source client, the
//! timeline store and the reconciliation engine. They carry no I/O and
//! no knowledge of where they are persisted.

pub mod commit;
pub mod deployment;
pub mod repository;
pub mod scan;

// Re-export commonly used types
pub use commit::*;
pub use deployment::*;
pub use repository::*;
pub use scan::*;
