// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! FSL Adapters: Image Algebra, Statistics, Montage Rendering
//!
//! `fslmaths`/`fslmerge` back the `ImageAlgebra` capability, `fslstats`
//! backs `VolumeStatistics`, and `slicer` backs `MontageRenderer`. The
//! algebra adapter is the workhorse of the label-refinement stage; every
//! method is one tool call with its output declared for verification.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::domain::toolchain::{
    ImageAlgebra, MontageRenderer, ToolError, VolumeStatistics, VoxelVolume,
};
use crate::infrastructure::process::ToolInvocation;

// ============================================================================
// fslmaths / fslmerge
// ============================================================================

pub struct FslImageAlgebra {
    fslmaths: String,
    fslmerge: String,
}

impl FslImageAlgebra {
    pub fn new(fslmaths: impl Into<String>, fslmerge: impl Into<String>) -> Self {
        Self {
            fslmaths: fslmaths.into(),
            fslmerge: fslmerge.into(),
        }
    }

    fn maths(&self) -> ToolInvocation {
        ToolInvocation::new(&self.fslmaths)
    }
}

#[async_trait]
impl ImageAlgebra for FslImageAlgebra {
    async fn multiply(&self, a: &Path, b: &Path, out: &Path) -> Result<(), ToolError> {
        self.maths()
            .arg(a)
            .arg("-mul")
            .arg(b)
            .arg(out)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }

    async fn subtract(&self, a: &Path, b: &Path, out: &Path) -> Result<(), ToolError> {
        self.maths()
            .arg(a)
            .arg("-sub")
            .arg(b)
            .arg(out)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }

    async fn threshold_binarize(
        &self,
        input: &Path,
        lower: f64,
        out: &Path,
    ) -> Result<(), ToolError> {
        self.maths()
            .arg(input)
            .arg("-thr")
            .arg(lower.to_string())
            .arg("-bin")
            .arg(out)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }

    async fn scale(&self, input: &Path, factor: f64, out: &Path) -> Result<(), ToolError> {
        self.maths()
            .arg(input)
            .arg("-mul")
            .arg(factor.to_string())
            .arg(out)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }

    async fn erode(&self, mask: &Path, out: &Path) -> Result<(), ToolError> {
        self.maths()
            .arg(mask)
            .arg("-ero")
            .arg(out)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }

    async fn dilate(&self, mask: &Path, out: &Path) -> Result<(), ToolError> {
        self.maths()
            .arg(mask)
            .arg("-dilM")
            .arg(out)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }

    async fn zero_like(&self, reference: &Path, out: &Path) -> Result<(), ToolError> {
        self.maths()
            .arg(reference)
            .arg("-mul")
            .arg("0")
            .arg(out)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }

    async fn stack(&self, inputs: &[PathBuf], out: &Path) -> Result<(), ToolError> {
        ToolInvocation::new(&self.fslmerge)
            .arg("-t")
            .arg(out)
            .args(inputs)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }

    async fn mean_over_stack(&self, stack: &Path, out: &Path) -> Result<(), ToolError> {
        self.maths()
            .arg(stack)
            .arg("-Tmean")
            .arg(out)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }

    async fn argmax_labels(&self, stack: &Path, out: &Path) -> Result<(), ToolError> {
        self.maths()
            .arg(stack)
            .arg("-Tmaxn")
            .arg(out)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }

    async fn extract_label(&self, atlas: &Path, label: u32, out: &Path) -> Result<(), ToolError> {
        self.maths()
            .arg(atlas)
            .arg("-thr")
            .arg(label.to_string())
            .arg("-uthr")
            .arg(label.to_string())
            .arg("-bin")
            .arg(out)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }
}

// ============================================================================
// fslstats
// ============================================================================

pub struct FslVolumeStatistics {
    program: String,
}

impl FslVolumeStatistics {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `fslstats <mask> -V` prints "<voxels> <cubic mm>"
    fn parse_volume(&self, stdout: &str) -> Result<VoxelVolume, ToolError> {
        let mut fields = stdout.split_whitespace();
        let voxels = fields
            .next()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| *v >= 0.0);
        let cubic_mm = fields.next().and_then(|v| v.parse::<f64>().ok());

        match (voxels, cubic_mm) {
            (Some(voxels), Some(cubic_mm)) => Ok(VoxelVolume {
                voxels: voxels.round() as u64,
                cubic_mm,
            }),
            _ => Err(ToolError::UnparsableOutput {
                program: self.program.clone(),
                detail: format!("expected '<voxels> <volume>', got '{stdout}'"),
            }),
        }
    }
}

#[async_trait]
impl VolumeStatistics for FslVolumeStatistics {
    async fn volume(&self, mask: &Path) -> Result<VoxelVolume, ToolError> {
        let output = ToolInvocation::new(&self.program)
            .arg(mask)
            .arg("-V")
            .run()
            .await?;
        self.parse_volume(&output.stdout)
    }
}

// ============================================================================
// slicer
// ============================================================================

pub struct SlicerMontageRenderer {
    program: String,
}

impl SlicerMontageRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl MontageRenderer for SlicerMontageRenderer {
    async fn render(
        &self,
        base: &Path,
        overlay: Option<&Path>,
        out: &Path,
    ) -> Result<(), ToolError> {
        let mut invocation = ToolInvocation::new(&self.program).arg(base);
        if let Some(overlay) = overlay {
            invocation = invocation.arg(overlay);
        }
        // -a renders the mid-slice sagittal/coronal/axial montage
        invocation
            .arg("-a")
            .arg(out)
            .expect_output(out)
            .run()
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fslstats_volume_output() {
        let stats = FslVolumeStatistics::new("fslstats");
        let parsed = stats.parse_volume("104823 131028.750000").unwrap();
        assert_eq!(parsed.voxels, 104823);
        assert!((parsed.cubic_mm - 131028.75).abs() < 1e-6);
    }

    #[test]
    fn parses_scientific_notation_volumes() {
        let stats = FslVolumeStatistics::new("fslstats");
        let parsed = stats.parse_volume("1000 1.250000e+03").unwrap();
        assert!((parsed.cubic_mm - 1250.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_malformed_stats_output() {
        let stats = FslVolumeStatistics::new("fslstats");
        assert!(stats.parse_volume("").is_err());
        assert!(stats.parse_volume("voxels volume").is_err());
        assert!(stats.parse_volume("12").is_err());
    }
}
