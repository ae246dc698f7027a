// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Job runner for deployment timeline scans
//!
//! Parses a repository link, layers configuration from defaults, a TOML
//! file, the environment and flags, then runs one scan end-to-end.

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Command, ConnectionArgs, ScanArgs, TimelineArgs};
pub use config::{ConfigError, ConfigOverrides, WorkerConfig};
