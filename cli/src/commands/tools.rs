// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `neoseg tools` - external tool preflight
//!
//! The pipeline owns no numerical machinery; if one configured binary is
//! missing, every run on this host will fail mid-pipeline. `tools check`
//! surfaces that before any data is touched.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use neoseg_core::infrastructure::PipelineConfig;

#[derive(Debug, Subcommand)]
pub enum ToolsCommand {
    /// Resolve every configured external binary
    Check,
}

pub fn handle_command(command: ToolsCommand, config_path: Option<&Path>) -> Result<()> {
    match command {
        ToolsCommand::Check => check(config_path),
    }
}

fn check(config_path: Option<&Path>) -> Result<()> {
    let (config, _) = PipelineConfig::discover(config_path)?;

    let mut missing = Vec::new();
    for (capability, program) in config.tools.all() {
        match resolve(program) {
            Some(path) => println!(
                "  {} {:<18} {}",
                "ok".green(),
                capability,
                path.display()
            ),
            None => {
                println!("  {} {:<18} {}", "missing".red(), capability, program);
                missing.push(capability);
            }
        }
    }

    if missing.is_empty() {
        println!("{}", "All external tools resolved".green());
        Ok(())
    } else {
        anyhow::bail!("missing external tools: {}", missing.join(", "))
    }
}

/// Absolute paths are checked directly; bare names resolve via PATH
fn resolve(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }
    which::which(program).ok()
}
