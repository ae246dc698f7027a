// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! dt-worker binary

use clap::Parser;
use dt_worker::{commands, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.command.logging().init("dt-worker")?;

    let output = match &cli.command {
        Command::Scan(args) => serde_json::to_string_pretty(&commands::scan(args).await?)?,
        Command::Timeline(args) => serde_json::to_string_pretty(&commands::timeline(args).await?)?,
    };
    println!("{output}");

    Ok(())
}
