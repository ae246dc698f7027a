// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Store error types

use thiserror::Error;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// The store rejected or failed a read or write
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to acquire store lock: {0}")]
    Lock(String),

    #[error("Corrupt record in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    #[error("Write rejected: {0}")]
    Rejected(String),
}
