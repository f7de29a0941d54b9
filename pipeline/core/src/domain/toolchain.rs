// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! External Tool Capability Interfaces (Anti-Corruption Layer)
//!
//! The pipeline supplies no numerical machinery of its own; every
//! computational step goes through one of these capability traits. The
//! traits isolate the engine from vendor command lines exactly the way the
//! orchestrator isolates agents from vendor LLM APIs: the domain names the
//! capability, the infrastructure layer names the binary.
//!
//! Implementations in `infrastructure/tools/`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// External tool failures, all fatal: the pipeline has no retry policy
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with status {status}: {stderr}", status = .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("'{program}' reported success but expected output {} was not written", .path.display())]
    MissingOutput { program: String, path: PathBuf },

    #[error("could not parse '{program}' output: {detail}")]
    UnparsableOutput { program: String, detail: String },
}

/// Interpolation policy for transform application
///
/// Continuous priors take the smooth kind; binary masks take nearest
/// neighbor so they stay in {0,1}. Violating this corrupts every downstream
/// thresholding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    NearestNeighbor,
}

/// Deformable transform estimated once per run by the registration stage
///
/// Produced with moving = subject brain and fixed = template, so the inverse
/// composition pulls any template-space object into native space. Consumed
/// read-only; never persisted beyond the run workspace.
#[derive(Debug, Clone)]
pub struct RegistrationTransform {
    pub affine: PathBuf,
    pub forward_warp: PathBuf,
    pub inverse_warp: PathBuf,
}

/// Voxel statistics for one binarized mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelVolume {
    pub voxels: u64,
    pub cubic_mm: f64,
}

/// Skull-stripper: raw volume -> (extracted brain, binary brain mask)
///
/// Both outputs share the input grid; the mask support is a subset of the
/// raw image domain.
#[async_trait]
pub trait BrainExtractor: Send + Sync {
    async fn extract(&self, raw: &Path, brain_out: &Path, mask_out: &Path)
        -> Result<(), ToolError>;
}

/// Deformable registration solver (affine + nonlinear, "SyN"-class)
#[async_trait]
pub trait RegistrationSolver: Send + Sync {
    /// Estimate fixed<->moving transforms, writing artifacts under `prefix`
    async fn register(
        &self,
        fixed: &Path,
        moving: &Path,
        prefix: &Path,
    ) -> Result<RegistrationTransform, ToolError>;
}

/// Transform application / resampling onto a reference grid
#[async_trait]
pub trait PriorResampler: Send + Sync {
    /// Pull a template-space object into native space via the
    /// inverse-warp-then-affine composition, sampling on `reference`'s grid
    async fn resample(
        &self,
        input: &Path,
        reference: &Path,
        transform: &RegistrationTransform,
        interpolation: Interpolation,
        output: &Path,
    ) -> Result<(), ToolError>;
}

/// Prior-guided N-class statistical segmenter with a mask constraint
///
/// `prior_pattern` and `posterior_pattern` carry a `{class}` placeholder;
/// class numbering is 1-based and positional (1 = tissue, 2 = CSF), and that
/// ordering is load-bearing for every later composition step. Returns the
/// expanded posterior paths in class order.
#[async_trait]
pub trait TissueSegmenter: Send + Sync {
    async fn segment(
        &self,
        brain: &Path,
        mask: &Path,
        prior_pattern: &str,
        class_count: usize,
        labels_out: &Path,
        posterior_pattern: &str,
    ) -> Result<Vec<PathBuf>, ToolError>;
}

/// Voxelwise image algebra over volumes already on a common grid
#[async_trait]
pub trait ImageAlgebra: Send + Sync {
    async fn multiply(&self, a: &Path, b: &Path, out: &Path) -> Result<(), ToolError>;

    async fn subtract(&self, a: &Path, b: &Path, out: &Path) -> Result<(), ToolError>;

    /// Keep voxels strictly above `lower`, then binarize
    async fn threshold_binarize(&self, input: &Path, lower: f64, out: &Path)
        -> Result<(), ToolError>;

    async fn scale(&self, input: &Path, factor: f64, out: &Path) -> Result<(), ToolError>;

    /// Erode a binary mask by one structuring element
    async fn erode(&self, mask: &Path, out: &Path) -> Result<(), ToolError>;

    /// Dilate a binary mask by one structuring element
    async fn dilate(&self, mask: &Path, out: &Path) -> Result<(), ToolError>;

    /// All-zero volume on `reference`'s grid
    async fn zero_like(&self, reference: &Path, out: &Path) -> Result<(), ToolError>;

    /// Stack 3-D volumes along a 4th (class) axis, preserving input order
    async fn stack(&self, inputs: &[PathBuf], out: &Path) -> Result<(), ToolError>;

    /// Mean across the 4th axis of a stacked volume
    async fn mean_over_stack(&self, stack: &Path, out: &Path) -> Result<(), ToolError>;

    /// Collapse a stacked volume to the argmax index along the 4th axis
    async fn argmax_labels(&self, stack: &Path, out: &Path) -> Result<(), ToolError>;

    /// Binarize an integer atlas at exactly one label value
    async fn extract_label(&self, atlas: &Path, label: u32, out: &Path) -> Result<(), ToolError>;
}

/// Fixed-slice-set montage renderer for visual QC
#[async_trait]
pub trait MontageRenderer: Send + Sync {
    async fn render(
        &self,
        base: &Path,
        overlay: Option<&Path>,
        out: &Path,
    ) -> Result<(), ToolError>;
}

/// Voxel-count / physical-volume statistics for a binarized mask
#[async_trait]
pub trait VolumeStatistics: Send + Sync {
    async fn volume(&self, mask: &Path) -> Result<VoxelVolume, ToolError>;
}

/// Expand a `{class}` pattern for one 1-based class index
pub fn class_path(pattern: &str, class: usize) -> PathBuf {
    PathBuf::from(pattern.replace("{class}", &class.to_string()))
}
