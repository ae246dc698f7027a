// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Source client error types

use thiserror::Error;

/// Result alias for source client operations
pub type SourceResult<T> = Result<T, SourceError>;

/// The source is unavailable for the requested step
///
/// Every variant is the same condition from the caller's perspective: the
/// host could not be reached, refused the credentials, throttled the
/// request or answered with something unreadable.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}: {body}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },

    #[error("Rate limited by source API (reset at {reset_at:?})")]
    RateLimited { reset_at: Option<i64> },

    #[error("Failed to decode source response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}
