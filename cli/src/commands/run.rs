// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `neoseg run` - execute the segmentation pipeline for one subject

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use neoseg_core::application::{RunReport, RunRequest, SegmentationPipeline, StageStatus};
use neoseg_core::infrastructure::PipelineConfig;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Raw subject volume (.nii or .nii.gz)
    pub input: PathBuf,

    /// Age token selecting the template bundle (e.g. "36w", "06mo")
    pub age: String,

    /// Output directory (default: <input dir>/<subject>_neoseg)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Working directory for intermediates (default: <output dir>/work)
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,
}

pub async fn execute(args: RunArgs, config_path: Option<&Path>) -> Result<()> {
    let (config, source) =
        PipelineConfig::discover(config_path).context("Failed to load configuration")?;
    if let Some(path) = &source {
        info!(config = %path.display(), "Loaded configuration");
    }

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(&args.input));
    let work_dir = args
        .work_dir
        .clone()
        .unwrap_or_else(|| output_dir.join("work"));

    let request = RunRequest {
        input: args.input,
        age: args.age,
        work_dir,
        output_dir,
    };

    let engine = SegmentationPipeline::from_config(&config);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").expect("valid template"));
    spinner.set_message("Running segmentation pipeline...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let outcome = engine.run(&request).await;
    spinner.finish_and_clear();

    match outcome {
        Ok(report) => {
            print_summary(&report);
            Ok(())
        }
        Err(err) => Err(err).context("Pipeline failed"),
    }
}

/// Default output directory: next to the input, named after the subject
fn default_output_dir(input: &Path) -> PathBuf {
    let stem = input
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| {
            name.strip_suffix(".nii.gz")
                .or_else(|| name.strip_suffix(".nii"))
                .unwrap_or(name)
        })
        .unwrap_or("subject");
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{stem}_neoseg"))
}

fn print_summary(report: &RunReport) {
    println!(
        "{} {}",
        "Pipeline completed:".green().bold(),
        report.subject
    );
    println!("  run id: {}", report.run_id);
    println!("  age:    {}", report.age);
    println!();

    for record in &report.stages {
        let status = match record.status {
            StageStatus::Completed => "ok".green(),
            StageStatus::Warned => "warn".yellow(),
            StageStatus::Failed => "failed".red(),
        };
        println!(
            "  {:<20} {:>6}  {} ms",
            record.stage.name(),
            status,
            record.duration_ms
        );
    }
    println!();

    if let Some(path) = &report.outputs.tissue_csf_volumes {
        println!("  2-class volumes: {}", path.display());
    }
    if let Some(path) = &report.outputs.all_volumes {
        println!("  4-class volumes: {}", path.display());
    }
    if let Some(path) = &report.outputs.refined_atlas {
        println!("  refined atlas:   {}", path.display());
    }
}
