// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Run Workspace and Artifact Naming
//!
//! Every intermediate artifact lives in one working directory under a fixed,
//! non-randomized name; final artifacts land in the output directory with
//! the subject id as prefix (the two CSV tables keep fixed names). All
//! path bookkeeping is concentrated here; no other module
//! composes artifact paths.
//!
//! Two concurrent runs sharing a working directory would corrupt each
//! other's intermediates; callers must hand each run a distinct directory.

use std::io;
use std::path::{Path, PathBuf};

use crate::domain::subject::SubjectId;

/// Per-run working + output directories and the full naming scheme
#[derive(Debug, Clone)]
pub struct RunWorkspace {
    work_dir: PathBuf,
    output_dir: PathBuf,
    subject: SubjectId,
}

impl RunWorkspace {
    /// Create both directories (and the QC subdirectory) up front
    pub fn prepare(
        work_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        subject: SubjectId,
    ) -> io::Result<Self> {
        let ws = Self {
            work_dir: work_dir.into(),
            output_dir: output_dir.into(),
            subject,
        };
        std::fs::create_dir_all(&ws.work_dir)?;
        std::fs::create_dir_all(ws.qc_dir())?;
        Ok(ws)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    /// Ad hoc intermediate under the working directory
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    // ------------------------------------------------------------------
    // Brain extraction
    // ------------------------------------------------------------------

    /// Skull-stripped brain volume. The `_mask` sibling name below matches
    /// the extractor's own output convention, so no rename pass is needed.
    pub fn extracted_brain(&self) -> PathBuf {
        self.scratch("brain.nii.gz")
    }

    pub fn brain_mask(&self) -> PathBuf {
        self.scratch("brain_mask.nii.gz")
    }

    pub fn dilated_brain_mask(&self) -> PathBuf {
        self.scratch("brain_mask_dilated.nii.gz")
    }

    // ------------------------------------------------------------------
    // Registration + prior transfer
    // ------------------------------------------------------------------

    /// Output prefix handed to the registration solver
    pub fn registration_prefix(&self) -> PathBuf {
        self.scratch("template_to_subject_")
    }

    /// Native-space prior for a 1-based class index (1 = tissue, 2 = CSF)
    pub fn native_prior(&self, class: usize) -> PathBuf {
        self.scratch(&format!("native_prior{class}.nii.gz"))
    }

    /// `{class}` pattern for the segmenter's prior argument
    pub fn native_prior_pattern(&self) -> String {
        self.scratch("native_prior{class}.nii.gz")
            .to_string_lossy()
            .into_owned()
    }

    pub fn native_ventricle_mask(&self) -> PathBuf {
        self.scratch("native_ventricle_mask.nii.gz")
    }

    pub fn native_subcortical_mask(&self) -> PathBuf {
        self.scratch("native_subcortical_gm_mask.nii.gz")
    }

    // ------------------------------------------------------------------
    // Segmentation
    // ------------------------------------------------------------------

    /// Hard labels emitted by the segmenter itself (kept for inspection;
    /// the reported atlases are rebuilt from the posteriors)
    pub fn segmenter_labels(&self) -> PathBuf {
        self.scratch("segmentation_labels.nii.gz")
    }

    /// `{class}` pattern for the segmenter's posterior outputs
    pub fn posterior_pattern(&self) -> String {
        self.scratch("posterior{class}.nii.gz")
            .to_string_lossy()
            .into_owned()
    }

    pub fn posterior(&self, class: usize) -> PathBuf {
        self.scratch(&format!("posterior{class}.nii.gz"))
    }

    /// Tissue posterior after the corrective re-mask by the undilated brain
    /// mask (the CSF posterior is deliberately left untouched)
    pub fn tissue_posterior(&self) -> PathBuf {
        self.scratch("tissue_posterior.nii.gz")
    }

    pub fn csf_posterior(&self) -> PathBuf {
        self.posterior(2)
    }

    // ------------------------------------------------------------------
    // Final outputs
    // ------------------------------------------------------------------

    fn prefixed(&self, suffix: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{suffix}", self.subject))
    }

    pub fn final_brain(&self) -> PathBuf {
        self.prefixed("brain.nii.gz")
    }

    pub fn final_brain_mask(&self) -> PathBuf {
        self.prefixed("brain_mask.nii.gz")
    }

    /// 2-class atlas (tissue/CSF)
    pub fn tissue_csf_atlas(&self) -> PathBuf {
        self.prefixed("tissue_csf_labels.nii.gz")
    }

    /// Refined 4-class atlas
    pub fn refined_atlas(&self) -> PathBuf {
        self.prefixed("all_labels.nii.gz")
    }

    /// Fixed table name, never subject-prefixed
    pub fn tissue_csf_volumes_csv(&self) -> PathBuf {
        self.output_dir.join("Tissue_and_csf_volumes.csv")
    }

    /// Fixed table name, never subject-prefixed
    pub fn all_volumes_csv(&self) -> PathBuf {
        self.output_dir.join("All_volumes.csv")
    }

    pub fn qc_dir(&self) -> PathBuf {
        self.output_dir.join("qc")
    }

    pub fn qc_montage(&self, name: &str) -> PathBuf {
        self.qc_dir().join(format!("{}_{name}.png", self.subject))
    }

    pub fn run_report(&self) -> PathBuf {
        self.prefixed("run_report.json")
    }
}
