// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `neoseg config` - configuration management

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use neoseg_core::infrastructure::PipelineConfig;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration and where it came from
    Show,

    /// Load the configuration and check it against the filesystem
    Validate,

    /// Write a default configuration manifest
    Generate {
        /// Destination (default: stdout)
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

pub fn handle_command(command: ConfigCommand, config_path: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommand::Show => show(config_path),
        ConfigCommand::Validate => validate(config_path),
        ConfigCommand::Generate { output } => generate(output),
    }
}

fn show(config_path: Option<&Path>) -> Result<()> {
    let (config, source) =
        PipelineConfig::discover(config_path).context("Failed to load configuration")?;
    match source {
        Some(path) => println!("{} {}", "# source:".dimmed(), path.display()),
        None => println!("{}", "# source: built-in defaults".dimmed()),
    }
    print!("{}", config.to_yaml());
    Ok(())
}

fn validate(config_path: Option<&Path>) -> Result<()> {
    let (config, source) =
        PipelineConfig::discover(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration is invalid")?;

    if !config.templates_root.is_dir() {
        anyhow::bail!(
            "templates_root {} does not exist or is not a directory",
            config.templates_root.display()
        );
    }

    match source {
        Some(path) => println!("{} {}", "Configuration OK:".green(), path.display()),
        None => println!("{}", "Configuration OK (built-in defaults)".green()),
    }
    Ok(())
}

fn generate(output: Option<PathBuf>) -> Result<()> {
    let yaml = PipelineConfig::default().to_yaml();
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, yaml)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", "Wrote".green(), path.display());
        }
        None => print!("{yaml}"),
    }
    Ok(())
}
