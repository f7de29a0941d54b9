// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod pipeline;
pub mod refinement;
pub mod volumetrics;
pub mod report;

pub use pipeline::{verify_output_liveness, PipelineTools, RunRequest, SegmentationPipeline};
pub use report::{RunReport, StageRecord, StageStatus};
