// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Command-line interface

use crate::config::ConfigOverrides;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use dt_domain_types::{RepoRef, RunFilter};
use dt_logging::CliLoggingArgs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dt-worker",
    author,
    version,
    about = "Reconstruct deployment timelines from source-control history"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan one branch and reconcile its deployment timeline
    Scan(ScanArgs),
    /// Print the stored deployment timeline of a branch as JSON
    Timeline(TimelineArgs),
}

impl Command {
    pub fn logging(&self) -> &CliLoggingArgs {
        match self {
            Command::Scan(args) => &args.logging,
            Command::Timeline(args) => &args.logging,
        }
    }
}

/// Connection settings shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite database path, or `:memory:`
    #[arg(long, env = "DT_DATABASE", value_name = "PATH")]
    pub database: Option<String>,

    /// Base URL of the source-control REST API
    #[arg(long, env = "DT_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// API token
    #[arg(long, env = "GH_PAT", hide_env_values = true)]
    pub token: Option<String>,

    /// Page size for API listings (1-100)
    #[arg(long)]
    pub per_page: Option<u8>,

    /// Maximum concurrent store lookups and writes per scan step
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}

impl ConnectionArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_url: self.api_url.clone(),
            token: self.token.clone(),
            database_path: self.database.clone(),
            per_page: self.per_page,
            max_concurrency: self.max_concurrency,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Repository link (`https://github.com/owner/name`) or `owner/name`
    #[arg(value_name = "REPO")]
    pub repo: RepoRef,

    /// Branch to scan (default: the repository's default branch)
    #[arg(long)]
    pub branch: Option<String>,

    /// Only count workflow runs whose name contains this text (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    pub workflow_name: Option<String>,

    /// Only count workflow runs created at or after this time
    #[arg(long, value_parser = parse_timestamp)]
    pub since: Option<DateTime<Utc>>,

    /// Only count workflow runs created at or before this time
    #[arg(long, value_parser = parse_timestamp)]
    pub until: Option<DateTime<Utc>>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub logging: CliLoggingArgs,
}

impl ScanArgs {
    pub fn run_filter(&self) -> RunFilter {
        RunFilter {
            name_pattern: self
                .workflow_name
                .as_deref()
                .map(str::trim)
                .filter(|pattern| !pattern.is_empty())
                .map(str::to_string),
            since: self.since,
            until: self.until,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TimelineArgs {
    #[arg(value_name = "REPO")]
    pub repo: RepoRef,

    /// Branch to print (default: the repository's default branch)
    #[arg(long)]
    pub branch: Option<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub logging: CliLoggingArgs,
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` meaning midnight UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("Invalid timestamp {value:?}: expected RFC 3339 or YYYY-MM-DD"))
}
