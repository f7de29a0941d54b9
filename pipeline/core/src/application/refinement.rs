// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Label-Algebra Refinement
//!
//! Decomposes the two segmentation posteriors into four refined classes
//! with pure image algebra, no learned component. The same split is run
//! twice: CSF against the ventricle mask and tissue against the
//! subcortical-GM mask.
//!
//! The split exploits double counting: stacking a posterior pair with a
//! mask-restricted copy of one of them makes the per-voxel class sum exceed
//! 1 exactly where the restricted copy and its source are simultaneously
//! high. Thresholding the sum at 1.1 therefore flags "pure" interior voxels
//! and leaves partial-volume boundary voxels alone.
//!
//! Atlas construction derives its stacking order from the enumerated label
//! tables in `domain::labels`; the argmax index of the stacked volume IS
//! the label value.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::labels::{RefinedLabel, TissueCsfLabel};
use crate::domain::toolchain::{ImageAlgebra, ToolError};
use crate::domain::workspace::RunWorkspace;

/// Per-voxel class-sum threshold separating double-counted interior voxels
/// from partial-volume boundary voxels
const DOUBLE_COUNT_THRESHOLD: f64 = 1.1;

/// Result of splitting one posterior against one anatomical mask
#[derive(Debug, Clone)]
pub struct PosteriorSplit {
    /// Mask-interior share of the posterior (e.g. ventricular CSF)
    pub restricted: PathBuf,
    /// What remains of the posterior outside the mask interior
    pub remainder: PathBuf,
}

/// Split `source_posterior` into its mask-interior share and the rest
///
/// `tag` names the intermediates in the run workspace. Both posteriors are
/// always part of the overlap stack regardless of which one is being split;
/// the class count used for the sum reconstruction is the stack height.
pub async fn split_posterior(
    algebra: &dyn ImageAlgebra,
    ws: &RunWorkspace,
    tissue_posterior: &Path,
    csf_posterior: &Path,
    source_posterior: &Path,
    anatomical_mask: &Path,
    tag: &str,
) -> Result<PosteriorSplit, ToolError> {
    debug!(tag, "Splitting posterior against anatomical mask");

    // Morphological open removes thin spurious mask fragments
    let eroded = ws.scratch(&format!("{tag}_mask_eroded.nii.gz"));
    let opened = ws.scratch(&format!("{tag}_mask_opened.nii.gz"));
    algebra.erode(anatomical_mask, &eroded).await?;
    algebra.dilate(&eroded, &opened).await?;

    // Mask-restricted copy of the posterior being split
    let restricted_estimate = ws.scratch(&format!("{tag}_restricted_estimate.nii.gz"));
    algebra
        .multiply(source_posterior, &opened, &restricted_estimate)
        .await?;

    // Sum across {tissue, CSF, restricted estimate}: mean x class count
    let overlap_stack = ws.scratch(&format!("{tag}_overlap_stack.nii.gz"));
    let stack_inputs = [
        tissue_posterior.to_path_buf(),
        csf_posterior.to_path_buf(),
        restricted_estimate.clone(),
    ];
    algebra.stack(&stack_inputs, &overlap_stack).await?;

    let overlap_mean = ws.scratch(&format!("{tag}_overlap_mean.nii.gz"));
    algebra.mean_over_stack(&overlap_stack, &overlap_mean).await?;

    let overlap_sum = ws.scratch(&format!("{tag}_overlap_sum.nii.gz"));
    algebra
        .scale(&overlap_mean, stack_inputs.len() as f64, &overlap_sum)
        .await?;

    // Voxels summing above 1 are double-counted mask-interior voxels
    let double_counted = ws.scratch(&format!("{tag}_double_counted.nii.gz"));
    algebra
        .threshold_binarize(&overlap_sum, DOUBLE_COUNT_THRESHOLD, &double_counted)
        .await?;

    let restricted = ws.scratch(&format!("{tag}_prior.nii.gz"));
    algebra
        .multiply(source_posterior, &double_counted, &restricted)
        .await?;

    let remainder = ws.scratch(&format!("{tag}_remainder.nii.gz"));
    algebra
        .subtract(source_posterior, &restricted, &remainder)
        .await?;

    Ok(PosteriorSplit {
        restricted,
        remainder,
    })
}

/// Class volumes of the refined atlas, one per `RefinedLabel`
#[derive(Debug, Clone)]
pub struct RefinedClassMaps {
    pub tissue_non_subcortical: PathBuf,
    pub subcortical_gm: PathBuf,
    pub csf_non_ventricular: PathBuf,
    pub ventricles: PathBuf,
}

impl RefinedClassMaps {
    fn class_volume(&self, label: RefinedLabel) -> &Path {
        match label {
            RefinedLabel::Tissue => &self.tissue_non_subcortical,
            RefinedLabel::SubcorticalGm => &self.subcortical_gm,
            RefinedLabel::Csf => &self.csf_non_ventricular,
            RefinedLabel::Ventricles => &self.ventricles,
        }
    }
}

/// Build the 2-class atlas: stack {background, tissue, CSF}, argmax
pub async fn build_tissue_csf_atlas(
    algebra: &dyn ImageAlgebra,
    ws: &RunWorkspace,
    out: &Path,
) -> Result<(), ToolError> {
    let background = ws.scratch("background.nii.gz");
    algebra.zero_like(&ws.tissue_posterior(), &background).await?;

    let mut inputs = vec![background];
    for label in TissueCsfLabel::ALL {
        inputs.push(match label {
            TissueCsfLabel::Tissue => ws.tissue_posterior(),
            TissueCsfLabel::Csf => ws.csf_posterior(),
        });
    }

    let stack = ws.scratch("tissue_csf_stack.nii.gz");
    algebra.stack(&inputs, &stack).await?;
    algebra.argmax_labels(&stack, out).await
}

/// Build the refined 4-class atlas: stack {background, class volumes in
/// label order}, argmax
pub async fn build_refined_atlas(
    algebra: &dyn ImageAlgebra,
    ws: &RunWorkspace,
    maps: &RefinedClassMaps,
    out: &Path,
) -> Result<(), ToolError> {
    let background = ws.scratch("background.nii.gz");
    algebra.zero_like(&ws.tissue_posterior(), &background).await?;

    let mut inputs = vec![background];
    inputs.extend(
        RefinedLabel::ALL
            .iter()
            .map(|label| maps.class_volume(*label).to_path_buf()),
    );

    let stack = ws.scratch("all_labels_stack.nii.gz");
    algebra.stack(&inputs, &stack).await?;
    algebra.argmax_labels(&stack, out).await
}
