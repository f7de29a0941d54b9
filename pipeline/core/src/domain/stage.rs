// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pipeline Stages and Error Taxonomy
//!
//! Every failure carries the identity of the stage that produced it; there
//! is no "log and continue" path. The taxonomy mirrors the three conditions
//! the pipeline distinguishes: bad input (pre-flight), an external tool
//! failing mid-run, and an empty output directory (post-flight liveness).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::subject::SubjectError;
use crate::domain::template::TemplateError;
use crate::domain::toolchain::ToolError;

/// The fixed, linear stage sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    BrainExtraction,
    Registration,
    PriorTransfer,
    TissueSegmentation,
    LabelRefinement,
    QcRendering,
    Volumetrics,
}

impl PipelineStage {
    /// Execution order; QC precedes volumetrics but does not gate it
    pub const ALL: [Self; 7] = [
        Self::BrainExtraction,
        Self::Registration,
        Self::PriorTransfer,
        Self::TissueSegmentation,
        Self::LabelRefinement,
        Self::QcRendering,
        Self::Volumetrics,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::BrainExtraction => "brain-extraction",
            Self::Registration => "registration",
            Self::PriorTransfer => "prior-transfer",
            Self::TissueSegmentation => "tissue-segmentation",
            Self::LabelRefinement => "label-refinement",
            Self::QcRendering => "qc-rendering",
            Self::Volumetrics => "volumetrics",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Pipeline failure taxonomy
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Pre-flight input validation (`InputNotFound` and friends)
    #[error(transparent)]
    Input(#[from] SubjectError),

    /// Template bundle resolution
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// An external tool failed mid-run; the remainder of the pipeline is
    /// aborted rather than run on stale or missing intermediates
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: ToolError,
    },

    /// Post-flight liveness: the run finished but produced nothing
    #[error("output directory {} is empty after pipeline completion", .0.display())]
    EmptyOutput(PathBuf),

    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize run report: {0}")]
    Report(#[from] serde_json::Error),
}

impl PipelineError {
    /// Attach stage identity to a tool failure
    pub fn stage(stage: PipelineStage, source: ToolError) -> Self {
        Self::Stage { stage, source }
    }
}
