// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # neoseg Pipeline CLI
//!
//! The `neoseg` binary drives the infant-brain segmentation pipeline.
//!
//! ## Commands
//!
//! - `neoseg run <INPUT> <AGE>` - Run the full pipeline for one subject
//! - `neoseg config show|validate|generate` - Configuration management
//! - `neoseg tools check` - Verify every configured external binary resolves
//!
//! Every computational step is delegated to external neuroimaging tools;
//! `tools check` is the fastest way to find out whether a host can run the
//! pipeline at all.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{ConfigCommand, RunArgs, ToolsCommand};

/// neoseg - infant-brain MRI segmentation pipeline
#[derive(Parser)]
#[command(name = "neoseg")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "NEOSEG_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "NEOSEG_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the segmentation pipeline for one subject
    #[command(name = "run")]
    Run(RunArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// External tool management
    #[command(name = "tools")]
    Tools {
        #[command(subcommand)]
        command: ToolsCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, cli.config.as_deref()).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config.as_deref()),
        Commands::Tools { command } => commands::tools::handle_command(command, cli.config.as_deref()),
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
