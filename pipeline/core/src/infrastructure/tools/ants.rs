// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! ANTs Adapters: Registration, Transform Application, Segmentation
//!
//! Three capabilities backed by the ANTs suite:
//! `antsRegistrationSyN.sh` (deformable registration),
//! `antsApplyTransforms` (resampling), and `Atropos` (prior-guided
//! statistical segmentation). Each adapter owns its binary's argument
//! conventions and artifact naming; the domain traits see none of it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::domain::toolchain::{
    class_path, Interpolation, PriorResampler, RegistrationSolver, RegistrationTransform,
    TissueSegmenter, ToolError,
};
use crate::infrastructure::process::{suffixed, ToolInvocation};

// ============================================================================
// antsRegistrationSyN.sh
// ============================================================================

pub struct AntsRegistrationSolver {
    program: String,
    /// Transform preset forwarded as `-t` (default "s": rigid+affine+SyN)
    transform: String,
}

impl AntsRegistrationSolver {
    pub fn new(program: impl Into<String>, transform: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            transform: transform.into(),
        }
    }
}

#[async_trait]
impl RegistrationSolver for AntsRegistrationSolver {
    async fn register(
        &self,
        fixed: &Path,
        moving: &Path,
        prefix: &Path,
    ) -> Result<RegistrationTransform, ToolError> {
        // ANTs composes its artifact names from the output prefix
        let affine = suffixed(prefix, "0GenericAffine.mat");
        let forward_warp = suffixed(prefix, "1Warp.nii.gz");
        let inverse_warp = suffixed(prefix, "1InverseWarp.nii.gz");

        ToolInvocation::new(&self.program)
            .args(["-d", "3"])
            .arg("-f")
            .arg(fixed)
            .arg("-m")
            .arg(moving)
            .arg("-o")
            .arg(prefix)
            .arg("-t")
            .arg(&self.transform)
            .expect_output(&affine)
            .expect_output(&forward_warp)
            .expect_output(&inverse_warp)
            .run()
            .await?;

        Ok(RegistrationTransform {
            affine,
            forward_warp,
            inverse_warp,
        })
    }
}

// ============================================================================
// antsApplyTransforms
// ============================================================================

pub struct AntsApplyTransforms {
    program: String,
}

impl AntsApplyTransforms {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl PriorResampler for AntsApplyTransforms {
    async fn resample(
        &self,
        input: &Path,
        reference: &Path,
        transform: &RegistrationTransform,
        interpolation: Interpolation,
        output: &Path,
    ) -> Result<(), ToolError> {
        let mode = match interpolation {
            Interpolation::Linear => "Linear",
            Interpolation::NearestNeighbor => "NearestNeighbor",
        };

        // Transforms are applied last-listed-first: the inverse warp moves
        // the object out of template space, then the inverted affine lands
        // it on the subject grid.
        ToolInvocation::new(&self.program)
            .args(["-d", "3"])
            .arg("-i")
            .arg(input)
            .arg("-r")
            .arg(reference)
            .arg("-o")
            .arg(output)
            .arg("-n")
            .arg(mode)
            .arg("-t")
            .arg(format!("[{},1]", transform.affine.display()))
            .arg("-t")
            .arg(&transform.inverse_warp)
            .expect_output(output)
            .run()
            .await?;
        Ok(())
    }
}

// ============================================================================
// Atropos
// ============================================================================

pub struct AtroposSegmenter {
    program: String,
    prior_weight: f64,
}

impl AtroposSegmenter {
    pub fn new(program: impl Into<String>, prior_weight: f64) -> Self {
        Self {
            program: program.into(),
            prior_weight,
        }
    }
}

#[async_trait]
impl TissueSegmenter for AtroposSegmenter {
    async fn segment(
        &self,
        brain: &Path,
        mask: &Path,
        prior_pattern: &str,
        class_count: usize,
        labels_out: &Path,
        posterior_pattern: &str,
    ) -> Result<Vec<PathBuf>, ToolError> {
        // Atropos takes printf-style class patterns
        let priors_printf = prior_pattern.replace("{class}", "%d");
        let posteriors_printf = posterior_pattern.replace("{class}", "%d");
        let posteriors: Vec<PathBuf> = (1..=class_count)
            .map(|class| class_path(posterior_pattern, class))
            .collect();

        ToolInvocation::new(&self.program)
            .args(["-d", "3"])
            .arg("-a")
            .arg(brain)
            .arg("-x")
            .arg(mask)
            .arg("-i")
            .arg(format!(
                "PriorProbabilityImages[{class_count},{priors_printf},{}]",
                self.prior_weight
            ))
            .args(["-m", "[0.1,1x1x1]"])
            .args(["-c", "[5,0.0]"])
            .arg("-o")
            .arg(format!(
                "[{},{posteriors_printf}]",
                labels_out.display()
            ))
            .expect_output(labels_out)
            .expect_outputs(posteriors.clone())
            .run()
            .await?;

        Ok(posteriors)
    }
}
