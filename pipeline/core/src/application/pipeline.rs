// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Segmentation Pipeline Engine (Application Service)
//!
//! Drives the fixed, linear stage sequence: brain extraction ->
//! registration -> prior transfer -> tissue segmentation -> label
//! refinement -> QC rendering -> volumetrics. Each stage blocks on its
//! external tool and every declared output is existence-checked before the
//! next stage reads it; there are no retries and no partial-failure
//! recovery, so a mid-pipeline failure aborts the remainder.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Stage sequencing over the capability traits
//! - **Dependencies:** Domain (workspace, labels, toolchain),
//!   Infrastructure (tool adapters via `from_config`)

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::application::refinement::{
    build_refined_atlas, build_tissue_csf_atlas, split_posterior, RefinedClassMaps,
};
use crate::application::report::{RunReport, StageStatus};
use crate::application::volumetrics::{measure_labels, write_table};
use crate::domain::labels::{RefinedLabel, TissueCsfLabel};
use crate::domain::stage::{PipelineError, PipelineStage};
use crate::domain::subject::InputVolume;
use crate::domain::template::{AgeToken, TemplateBundle};
use crate::domain::toolchain::{
    BrainExtractor, ImageAlgebra, Interpolation, MontageRenderer, PriorResampler,
    RegistrationSolver, RegistrationTransform, TissueSegmenter, ToolError, VolumeStatistics,
};
use crate::domain::workspace::RunWorkspace;
use crate::infrastructure::config::PipelineConfig;
use crate::infrastructure::tools::{
    AntsApplyTransforms, AntsRegistrationSolver, AtroposSegmenter, FslImageAlgebra,
    FslVolumeStatistics, HdBetExtractor, SlicerMontageRenderer,
};

/// The external capabilities the engine sequences
///
/// Assembled from the configuration in production; tests inject in-process
/// fakes through the same seams.
pub struct PipelineTools {
    pub extractor: Arc<dyn BrainExtractor>,
    pub registration: Arc<dyn RegistrationSolver>,
    pub resampler: Arc<dyn PriorResampler>,
    pub segmenter: Arc<dyn TissueSegmenter>,
    pub algebra: Arc<dyn ImageAlgebra>,
    pub montage: Arc<dyn MontageRenderer>,
    pub statistics: Arc<dyn VolumeStatistics>,
}

/// One pipeline invocation
///
/// Concurrent runs must use distinct `work_dir`s: intermediates carry
/// fixed, non-randomized names and there is no locking.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input: PathBuf,
    pub age: String,
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Segmentation pipeline engine
pub struct SegmentationPipeline {
    tools: PipelineTools,
    templates_root: PathBuf,
    qc_fatal: bool,
}

impl SegmentationPipeline {
    pub fn new(tools: PipelineTools, templates_root: impl Into<PathBuf>, qc_fatal: bool) -> Self {
        Self {
            tools,
            templates_root: templates_root.into(),
            qc_fatal,
        }
    }

    /// Assemble the production engine from the configuration manifest
    pub fn from_config(config: &PipelineConfig) -> Self {
        let tools = PipelineTools {
            extractor: Arc::new(HdBetExtractor::new(config.tools.brain_extractor.clone())),
            registration: Arc::new(AntsRegistrationSolver::new(
                config.tools.registration.clone(),
                config.registration.transform.clone(),
            )),
            resampler: Arc::new(AntsApplyTransforms::new(config.tools.apply_transforms.clone())),
            segmenter: Arc::new(AtroposSegmenter::new(
                config.tools.segmenter.clone(),
                config.segmentation.prior_weight,
            )),
            algebra: Arc::new(FslImageAlgebra::new(
                config.tools.fslmaths.clone(),
                config.tools.fslmerge.clone(),
            )),
            montage: Arc::new(SlicerMontageRenderer::new(config.tools.slicer.clone())),
            statistics: Arc::new(FslVolumeStatistics::new(config.tools.fslstats.clone())),
        };
        Self::new(tools, config.templates_root.clone(), config.qc.fatal)
    }

    /// Run the pipeline to completion
    ///
    /// Input and template validation happen before anything is created on
    /// disk. The run report is written even when a stage fails.
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport, PipelineError> {
        let input = InputVolume::resolve(&request.input)?;
        let age = AgeToken::new(&request.age)?;
        let bundle = TemplateBundle::resolve(&self.templates_root, &age)?;

        let ws = RunWorkspace::prepare(
            &request.work_dir,
            &request.output_dir,
            input.subject().clone(),
        )?;

        info!(
            subject = %ws.subject(),
            age = %age,
            work_dir = %ws.work_dir().display(),
            output_dir = %ws.output_dir().display(),
            "Starting segmentation pipeline"
        );

        let mut report = RunReport::begin(ws.subject().as_str(), age.as_str());
        let outcome = self.execute(&input, &bundle, &ws, &mut report).await;
        report.finish();
        std::fs::write(ws.run_report(), report.to_json()?)?;

        match outcome {
            Ok(()) => {
                info!(subject = %ws.subject(), run_id = %report.run_id, "Pipeline completed");
                Ok(report)
            }
            Err(err) => Err(err),
        }
    }

    async fn execute(
        &self,
        input: &InputVolume,
        bundle: &TemplateBundle,
        ws: &RunWorkspace,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        // 1. Brain extraction
        let (started, timer) = stage_start(PipelineStage::BrainExtraction);
        let result = self
            .tools
            .extractor
            .extract(input.path(), &ws.extracted_brain(), &ws.brain_mask())
            .await;
        seal(report, PipelineStage::BrainExtraction, started, timer, result)?;

        // 2. Registration: moving = subject brain, fixed = template, so the
        // single estimated transform pulls template-space objects native
        let (started, timer) = stage_start(PipelineStage::Registration);
        let result = self
            .tools
            .registration
            .register(
                &bundle.template,
                &ws.extracted_brain(),
                &ws.registration_prefix(),
            )
            .await;
        let transform = seal(report, PipelineStage::Registration, started, timer, result)?;

        // 3. Prior transfer
        let (started, timer) = stage_start(PipelineStage::PriorTransfer);
        let result = self.transfer_priors(bundle, ws, &transform).await;
        seal(report, PipelineStage::PriorTransfer, started, timer, result)?;

        // 4. Tissue segmentation
        let (started, timer) = stage_start(PipelineStage::TissueSegmentation);
        let result = self.segment_tissue(ws).await;
        seal(report, PipelineStage::TissueSegmentation, started, timer, result)?;

        // 5. Label refinement
        let (started, timer) = stage_start(PipelineStage::LabelRefinement);
        let result = self.refine_labels(ws).await;
        seal(report, PipelineStage::LabelRefinement, started, timer, result)?;

        // 6. QC rendering, the only stage that may degrade to a warning
        let (started, timer) = stage_start(PipelineStage::QcRendering);
        match self.render_qc(input, ws).await {
            Ok(()) => report.record(
                PipelineStage::QcRendering,
                StageStatus::Completed,
                started,
                timer.elapsed(),
                None,
            ),
            Err(err) if !self.qc_fatal => {
                warn!(stage = %PipelineStage::QcRendering, error = %err, "QC rendering failed; continuing");
                report.record(
                    PipelineStage::QcRendering,
                    StageStatus::Warned,
                    started,
                    timer.elapsed(),
                    Some(err.to_string()),
                );
            }
            Err(err) => {
                report.record(
                    PipelineStage::QcRendering,
                    StageStatus::Failed,
                    started,
                    timer.elapsed(),
                    Some(err.to_string()),
                );
                return Err(PipelineError::stage(PipelineStage::QcRendering, err));
            }
        }

        // 7. Volumetrics
        let (started, timer) = stage_start(PipelineStage::Volumetrics);
        let result = self.measure_volumes(ws).await;
        let (tissue_csf, refined) =
            seal(report, PipelineStage::Volumetrics, started, timer, result)?;
        write_table(&ws.tissue_csf_volumes_csv(), &tissue_csf)?;
        write_table(&ws.all_volumes_csv(), &refined)?;

        // Final artifacts under the output directory, subject-prefixed
        std::fs::copy(ws.extracted_brain(), ws.final_brain())?;
        std::fs::copy(ws.brain_mask(), ws.final_brain_mask())?;

        report.outputs.brain = Some(ws.final_brain());
        report.outputs.brain_mask = Some(ws.final_brain_mask());
        report.outputs.tissue_csf_atlas = Some(ws.tissue_csf_atlas());
        report.outputs.refined_atlas = Some(ws.refined_atlas());
        report.outputs.tissue_csf_volumes = Some(ws.tissue_csf_volumes_csv());
        report.outputs.all_volumes = Some(ws.all_volumes_csv());

        verify_output_liveness(ws.output_dir())
    }

    /// Pull every template-space reference object into native space.
    /// Continuous priors resample smoothly; binary masks take nearest
    /// neighbor so they stay in {0,1}.
    async fn transfer_priors(
        &self,
        bundle: &TemplateBundle,
        ws: &RunWorkspace,
        transform: &RegistrationTransform,
    ) -> Result<(), ToolError> {
        let reference = ws.extracted_brain();
        let transfers: [(&Path, PathBuf, Interpolation); 4] = [
            (&bundle.tissue_prior, ws.native_prior(1), Interpolation::Linear),
            (&bundle.csf_prior, ws.native_prior(2), Interpolation::Linear),
            (
                &bundle.ventricle_mask,
                ws.native_ventricle_mask(),
                Interpolation::NearestNeighbor,
            ),
            (
                &bundle.subcortical_mask,
                ws.native_subcortical_mask(),
                Interpolation::NearestNeighbor,
            ),
        ];

        for (source, destination, interpolation) in transfers {
            self.tools
                .resampler
                .resample(source, &reference, transform, interpolation, &destination)
                .await?;
        }
        Ok(())
    }

    /// Two-class segmentation inside a one-element-dilated brain mask, then
    /// the corrective re-mask of the tissue posterior (and only that one:
    /// CSF at the brain surface is expected and must not be suppressed).
    async fn segment_tissue(&self, ws: &RunWorkspace) -> Result<(), ToolError> {
        self.tools
            .algebra
            .dilate(&ws.brain_mask(), &ws.dilated_brain_mask())
            .await?;

        self.tools
            .segmenter
            .segment(
                &ws.extracted_brain(),
                &ws.dilated_brain_mask(),
                &ws.native_prior_pattern(),
                TissueCsfLabel::ALL.len(),
                &ws.segmenter_labels(),
                &ws.posterior_pattern(),
            )
            .await?;

        self.tools
            .algebra
            .multiply(&ws.posterior(1), &ws.brain_mask(), &ws.tissue_posterior())
            .await
    }

    async fn refine_labels(&self, ws: &RunWorkspace) -> Result<(), ToolError> {
        let algebra = self.tools.algebra.as_ref();
        let tissue = ws.tissue_posterior();
        let csf = ws.csf_posterior();

        let ventricle_split = split_posterior(
            algebra,
            ws,
            &tissue,
            &csf,
            &csf,
            &ws.native_ventricle_mask(),
            "ventricle",
        )
        .await?;

        let subcortical_split = split_posterior(
            algebra,
            ws,
            &tissue,
            &csf,
            &tissue,
            &ws.native_subcortical_mask(),
            "subcortical_gm",
        )
        .await?;

        let maps = RefinedClassMaps {
            tissue_non_subcortical: subcortical_split.remainder,
            subcortical_gm: subcortical_split.restricted,
            csf_non_ventricular: ventricle_split.remainder,
            ventricles: ventricle_split.restricted,
        };

        build_tissue_csf_atlas(algebra, ws, &ws.tissue_csf_atlas()).await?;
        build_refined_atlas(algebra, ws, &maps, &ws.refined_atlas()).await
    }

    async fn render_qc(&self, input: &InputVolume, ws: &RunWorkspace) -> Result<(), ToolError> {
        let montage = self.tools.montage.as_ref();
        let brain = ws.extracted_brain();

        montage
            .render(
                input.path(),
                Some(&brain),
                &ws.qc_montage("brain_extraction"),
            )
            .await?;
        montage
            .render(
                &brain,
                Some(&ws.tissue_posterior()),
                &ws.qc_montage("tissue_posterior"),
            )
            .await?;
        montage
            .render(
                &brain,
                Some(&ws.csf_posterior()),
                &ws.qc_montage("csf_posterior"),
            )
            .await?;
        montage
            .render(
                &brain,
                Some(&ws.tissue_csf_atlas()),
                &ws.qc_montage("tissue_csf_labels"),
            )
            .await?;
        montage
            .render(
                &brain,
                Some(&ws.refined_atlas()),
                &ws.qc_montage("all_labels"),
            )
            .await
    }

    async fn measure_volumes(
        &self,
        ws: &RunWorkspace,
    ) -> Result<(crate::domain::volume_report::VolumeTable, crate::domain::volume_report::VolumeTable), ToolError>
    {
        let algebra = self.tools.algebra.as_ref();
        let statistics = self.tools.statistics.as_ref();

        let tissue_csf = measure_labels(
            algebra,
            statistics,
            ws,
            &ws.tissue_csf_atlas(),
            &TissueCsfLabel::table(),
        )
        .await?;

        let refined = measure_labels(
            algebra,
            statistics,
            ws,
            &ws.refined_atlas(),
            &RefinedLabel::table(),
        )
        .await?;

        Ok((tissue_csf, refined))
    }
}

/// Post-flight liveness: fail when the output directory holds no files
/// (directories alone do not count)
pub fn verify_output_liveness(output_dir: &Path) -> Result<(), PipelineError> {
    if contains_any_file(output_dir)? {
        Ok(())
    } else {
        Err(PipelineError::EmptyOutput(output_dir.to_path_buf()))
    }
}

fn contains_any_file(dir: &Path) -> Result<bool, std::io::Error> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() || (path.is_dir() && contains_any_file(&path)?) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn stage_start(stage: PipelineStage) -> (DateTime<Utc>, Instant) {
    info!(stage = %stage, "Starting stage");
    (Utc::now(), Instant::now())
}

/// Record the stage outcome and attach stage identity to any failure
fn seal<T>(
    report: &mut RunReport,
    stage: PipelineStage,
    started: DateTime<Utc>,
    timer: Instant,
    result: Result<T, ToolError>,
) -> Result<T, PipelineError> {
    match result {
        Ok(value) => {
            report.record(stage, StageStatus::Completed, started, timer.elapsed(), None);
            info!(stage = %stage, elapsed_ms = timer.elapsed().as_millis() as u64, "Stage completed");
            Ok(value)
        }
        Err(err) => {
            report.record(
                stage,
                StageStatus::Failed,
                started,
                timer.elapsed(),
                Some(err.to_string()),
            );
            Err(PipelineError::stage(stage, err))
        }
    }
}
