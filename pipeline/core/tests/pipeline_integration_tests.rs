// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the segmentation pipeline engine
//!
//! The engine is assembled with in-process fake tools that write marker
//! files and record every call, so these tests verify the orchestration
//! contract end to end: stage ordering, artifact naming, interpolation
//! policy, stacking order, table bytes, and failure propagation, without
//! any external neuroimaging binary.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use neoseg_core::application::{
    verify_output_liveness, PipelineTools, RunRequest, RunReport, SegmentationPipeline,
    StageStatus,
};
use neoseg_core::domain::stage::{PipelineError, PipelineStage};
use neoseg_core::domain::subject::SubjectError;
use neoseg_core::domain::toolchain::{
    class_path, BrainExtractor, ImageAlgebra, Interpolation, MontageRenderer, PriorResampler,
    RegistrationSolver, RegistrationTransform, TissueSegmenter, ToolError, VolumeStatistics,
    VoxelVolume,
};

// ============================================================================
// Fake toolchain
// ============================================================================

fn name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

fn touch(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

#[derive(Default)]
struct Fake {
    log: Mutex<Vec<String>>,
    fail_registration: bool,
    fail_qc: bool,
}

impl Fake {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing_registration() -> Arc<Self> {
        Arc::new(Self {
            fail_registration: true,
            ..Self::default()
        })
    }

    fn failing_qc() -> Arc<Self> {
        Arc::new(Self {
            fail_qc: true,
            ..Self::default()
        })
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn position(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .position(|e| e.starts_with(prefix))
            .unwrap_or_else(|| panic!("no log entry starting with '{prefix}'"))
    }
}

#[async_trait]
impl BrainExtractor for Fake {
    async fn extract(
        &self,
        raw: &Path,
        brain_out: &Path,
        mask_out: &Path,
    ) -> Result<(), ToolError> {
        self.push(format!("extract:{}", name(raw)));
        touch(brain_out, "brain");
        touch(mask_out, "mask");
        Ok(())
    }
}

#[async_trait]
impl RegistrationSolver for Fake {
    async fn register(
        &self,
        fixed: &Path,
        moving: &Path,
        prefix: &Path,
    ) -> Result<RegistrationTransform, ToolError> {
        self.push(format!("register:fixed={}:moving={}", name(fixed), name(moving)));
        if self.fail_registration {
            return Err(ToolError::NonZeroExit {
                program: "fake-registration".to_string(),
                code: Some(1),
                stderr: "synthetic failure".to_string(),
            });
        }
        let suffixed = |s: &str| {
            let mut os = prefix.as_os_str().to_os_string();
            os.push(s);
            PathBuf::from(os)
        };
        let transform = RegistrationTransform {
            affine: suffixed("0GenericAffine.mat"),
            forward_warp: suffixed("1Warp.nii.gz"),
            inverse_warp: suffixed("1InverseWarp.nii.gz"),
        };
        touch(&transform.affine, "affine");
        touch(&transform.forward_warp, "warp");
        touch(&transform.inverse_warp, "invwarp");
        Ok(transform)
    }
}

#[async_trait]
impl PriorResampler for Fake {
    async fn resample(
        &self,
        input: &Path,
        _reference: &Path,
        _transform: &RegistrationTransform,
        interpolation: Interpolation,
        output: &Path,
    ) -> Result<(), ToolError> {
        let mode = match interpolation {
            Interpolation::Linear => "linear",
            Interpolation::NearestNeighbor => "nearest",
        };
        self.push(format!("resample:{}->{}:{mode}", name(input), name(output)));
        touch(output, mode);
        Ok(())
    }
}

#[async_trait]
impl TissueSegmenter for Fake {
    async fn segment(
        &self,
        _brain: &Path,
        mask: &Path,
        _prior_pattern: &str,
        class_count: usize,
        labels_out: &Path,
        posterior_pattern: &str,
    ) -> Result<Vec<PathBuf>, ToolError> {
        self.push(format!("segment:mask={}", name(mask)));
        touch(labels_out, "labels");
        let mut posteriors = Vec::new();
        for class in 1..=class_count {
            let posterior = class_path(posterior_pattern, class);
            touch(&posterior, "posterior");
            posteriors.push(posterior);
        }
        Ok(posteriors)
    }
}

#[async_trait]
impl ImageAlgebra for Fake {
    async fn multiply(&self, a: &Path, b: &Path, out: &Path) -> Result<(), ToolError> {
        self.push(format!("multiply:{}*{}->{}", name(a), name(b), name(out)));
        touch(out, "multiply");
        Ok(())
    }

    async fn subtract(&self, a: &Path, b: &Path, out: &Path) -> Result<(), ToolError> {
        self.push(format!("subtract:{}-{}->{}", name(a), name(b), name(out)));
        touch(out, "subtract");
        Ok(())
    }

    async fn threshold_binarize(
        &self,
        input: &Path,
        lower: f64,
        out: &Path,
    ) -> Result<(), ToolError> {
        self.push(format!("threshold:{}@{lower}->{}", name(input), name(out)));
        touch(out, "threshold");
        Ok(())
    }

    async fn scale(&self, input: &Path, factor: f64, out: &Path) -> Result<(), ToolError> {
        self.push(format!("scale:{}x{factor}->{}", name(input), name(out)));
        touch(out, "scale");
        Ok(())
    }

    async fn erode(&self, mask: &Path, out: &Path) -> Result<(), ToolError> {
        self.push(format!("erode:{}->{}", name(mask), name(out)));
        touch(out, "erode");
        Ok(())
    }

    async fn dilate(&self, mask: &Path, out: &Path) -> Result<(), ToolError> {
        self.push(format!("dilate:{}->{}", name(mask), name(out)));
        touch(out, "dilate");
        Ok(())
    }

    async fn zero_like(&self, reference: &Path, out: &Path) -> Result<(), ToolError> {
        self.push(format!("zero:{}->{}", name(reference), name(out)));
        touch(out, "zero");
        Ok(())
    }

    async fn stack(&self, inputs: &[PathBuf], out: &Path) -> Result<(), ToolError> {
        let joined = inputs.iter().map(|p| name(p)).collect::<Vec<_>>().join("+");
        self.push(format!("stack:{joined}->{}", name(out)));
        touch(out, "stack");
        Ok(())
    }

    async fn mean_over_stack(&self, stack: &Path, out: &Path) -> Result<(), ToolError> {
        self.push(format!("tmean:{}->{}", name(stack), name(out)));
        touch(out, "tmean");
        Ok(())
    }

    async fn argmax_labels(&self, stack: &Path, out: &Path) -> Result<(), ToolError> {
        self.push(format!("argmax:{}->{}", name(stack), name(out)));
        touch(out, "argmax");
        Ok(())
    }

    async fn extract_label(&self, atlas: &Path, label: u32, out: &Path) -> Result<(), ToolError> {
        self.push(format!("extract_label:{}:{label}->{}", name(atlas), name(out)));
        // the statistics fake keys off this content
        touch(out, &format!("{}:{label}", name(atlas)));
        Ok(())
    }
}

#[async_trait]
impl MontageRenderer for Fake {
    async fn render(
        &self,
        base: &Path,
        overlay: Option<&Path>,
        out: &Path,
    ) -> Result<(), ToolError> {
        let overlay = overlay.map(|p| name(p)).unwrap_or_default();
        self.push(format!("render:{}+{overlay}->{}", name(base), name(out)));
        if self.fail_qc {
            return Err(ToolError::NonZeroExit {
                program: "fake-slicer".to_string(),
                code: Some(1),
                stderr: "no display".to_string(),
            });
        }
        touch(out, "montage");
        Ok(())
    }
}

#[async_trait]
impl VolumeStatistics for Fake {
    async fn volume(&self, mask: &Path) -> Result<VoxelVolume, ToolError> {
        self.push(format!("volume:{}", name(mask)));
        let content = std::fs::read_to_string(mask).unwrap();
        let cubic_mm = [
            ("tissue_csf_labels.nii.gz:1", 800.0),
            ("tissue_csf_labels.nii.gz:2", 200.0),
            ("all_labels.nii.gz:1", 600.0),
            ("all_labels.nii.gz:2", 150.0),
            ("all_labels.nii.gz:3", 120.0),
            ("all_labels.nii.gz:4", 80.0),
        ]
        .iter()
        .find(|(suffix, _)| content.ends_with(suffix))
        .map(|(_, v)| *v)
        .unwrap_or_else(|| panic!("unexpected mask content '{content}'"));
        Ok(VoxelVolume {
            voxels: cubic_mm as u64,
            cubic_mm,
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

const BUNDLE_MEMBERS: [&str; 6] = [
    "template",
    "template_brain_mask",
    "prior1",
    "prior2",
    "ventricle_mask",
    "subcortical_gm_mask",
];

struct Case {
    _dir: tempfile::TempDir,
    input: PathBuf,
    work_dir: PathBuf,
    output_dir: PathBuf,
    templates_root: PathBuf,
}

impl Case {
    fn seed() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sub-01_T2w.nii.gz");
        std::fs::write(&input, b"raw").unwrap();

        let templates_root = dir.path().join("templates");
        let bundle = templates_root.join("06mo");
        std::fs::create_dir_all(&bundle).unwrap();
        for member in BUNDLE_MEMBERS {
            std::fs::write(bundle.join(format!("{member}.nii.gz")), b"template").unwrap();
        }

        Self {
            input,
            work_dir: dir.path().join("work"),
            output_dir: dir.path().join("out"),
            templates_root,
            _dir: dir,
        }
    }

    fn request(&self) -> RunRequest {
        RunRequest {
            input: self.input.clone(),
            age: "06mo".to_string(),
            work_dir: self.work_dir.clone(),
            output_dir: self.output_dir.clone(),
        }
    }

    fn engine(&self, fake: &Arc<Fake>, qc_fatal: bool) -> SegmentationPipeline {
        let tools = PipelineTools {
            extractor: fake.clone(),
            registration: fake.clone(),
            resampler: fake.clone(),
            segmenter: fake.clone(),
            algebra: fake.clone(),
            montage: fake.clone(),
            statistics: fake.clone(),
        };
        SegmentationPipeline::new(tools, &self.templates_root, qc_fatal)
    }

    async fn run(&self, fake: &Arc<Fake>) -> Result<RunReport, PipelineError> {
        self.engine(fake, false).run(&self.request()).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn full_run_produces_expected_artifacts() {
    let case = Case::seed();
    let fake = Fake::new();
    let report = case.run(&fake).await.expect("pipeline should complete");

    let out = &case.output_dir;
    assert!(out.join("sub-01_T2w_brain.nii.gz").is_file());
    assert!(out.join("sub-01_T2w_brain_mask.nii.gz").is_file());
    assert!(out.join("sub-01_T2w_tissue_csf_labels.nii.gz").is_file());
    assert!(out.join("sub-01_T2w_all_labels.nii.gz").is_file());
    assert!(out.join("sub-01_T2w_run_report.json").is_file());
    assert!(out.join("qc/sub-01_T2w_brain_extraction.png").is_file());
    assert!(out.join("qc/sub-01_T2w_all_labels.png").is_file());

    let tissue_csf = std::fs::read_to_string(out.join("Tissue_and_csf_volumes.csv")).unwrap();
    assert_eq!(tissue_csf, "Volume\nTissue,800.000000\nCSF,200.000000\n");

    let all = std::fs::read_to_string(out.join("All_volumes.csv")).unwrap();
    assert_eq!(
        all,
        "Volume\nTissue,600.000000\nSubcortical_GM,150.000000\nCSF,120.000000\nVentricles,80.000000\n"
    );

    assert!(report
        .stages
        .iter()
        .all(|s| s.status == StageStatus::Completed));
    assert_eq!(report.subject, "sub-01_T2w");
}

#[tokio::test]
async fn stages_run_in_pipeline_order() {
    let case = Case::seed();
    let fake = Fake::new();
    case.run(&fake).await.unwrap();

    let extract = fake.position("extract:");
    let register = fake.position("register:");
    let resample = fake.position("resample:");
    let segment = fake.position("segment:");
    let render = fake.position("render:");
    let measure = fake.position("extract_label:");

    assert!(extract < register);
    assert!(register < resample);
    assert!(resample < segment);
    assert!(segment < render);
    assert!(render < measure);
}

#[tokio::test]
async fn registration_direction_is_template_fixed_subject_moving() {
    let case = Case::seed();
    let fake = Fake::new();
    case.run(&fake).await.unwrap();

    assert!(fake
        .entries()
        .contains(&"register:fixed=template.nii.gz:moving=brain.nii.gz".to_string()));
}

#[tokio::test]
async fn binary_masks_transfer_nearest_neighbor() {
    let case = Case::seed();
    let fake = Fake::new();
    case.run(&fake).await.unwrap();

    let entries = fake.entries();
    let resamples: Vec<_> = entries
        .iter()
        .filter(|e| e.starts_with("resample:"))
        .collect();
    assert_eq!(resamples.len(), 4);

    assert!(entries
        .contains(&"resample:prior1.nii.gz->native_prior1.nii.gz:linear".to_string()));
    assert!(entries
        .contains(&"resample:prior2.nii.gz->native_prior2.nii.gz:linear".to_string()));
    assert!(entries.contains(
        &"resample:ventricle_mask.nii.gz->native_ventricle_mask.nii.gz:nearest".to_string()
    ));
    assert!(entries.contains(
        &"resample:subcortical_gm_mask.nii.gz->native_subcortical_gm_mask.nii.gz:nearest"
            .to_string()
    ));
}

#[tokio::test]
async fn segmentation_mask_is_dilated_and_only_tissue_remasked() {
    let case = Case::seed();
    let fake = Fake::new();
    case.run(&fake).await.unwrap();

    let entries = fake.entries();
    assert!(entries
        .contains(&"dilate:brain_mask.nii.gz->brain_mask_dilated.nii.gz".to_string()));
    assert!(entries.contains(&"segment:mask=brain_mask_dilated.nii.gz".to_string()));

    // corrective re-mask applies to the tissue posterior only
    assert!(entries.contains(
        &"multiply:posterior1.nii.gz*brain_mask.nii.gz->tissue_posterior.nii.gz".to_string()
    ));
    assert!(!entries
        .iter()
        .any(|e| e.starts_with("multiply:posterior2.nii.gz*brain_mask.nii.gz")));
}

#[tokio::test]
async fn refined_stack_order_matches_label_table() {
    let case = Case::seed();
    let fake = Fake::new();
    case.run(&fake).await.unwrap();

    // background first, then ascending label order: tissue(1), subGM(2),
    // CSF(3), ventricles(4)
    let expected = "stack:background.nii.gz\
        +subcortical_gm_remainder.nii.gz\
        +subcortical_gm_prior.nii.gz\
        +ventricle_remainder.nii.gz\
        +ventricle_prior.nii.gz\
        ->all_labels_stack.nii.gz";
    assert!(
        fake.entries().contains(&expected.to_string()),
        "refined stack order drifted: {:?}",
        fake.entries()
            .iter()
            .filter(|e| e.starts_with("stack:"))
            .collect::<Vec<_>>()
    );

    let expected_two = "stack:background.nii.gz\
        +tissue_posterior.nii.gz\
        +posterior2.nii.gz\
        ->tissue_csf_stack.nii.gz";
    assert!(fake.entries().contains(&expected_two.to_string()));
}

#[tokio::test]
async fn missing_input_fails_preflight_without_creating_outputs() {
    let case = Case::seed();
    let fake = Fake::new();

    let mut request = case.request();
    request.input = case.input.with_file_name("absent.nii.gz");

    let err = case
        .engine(&fake, false)
        .run(&request)
        .await
        .expect_err("missing input must fail");
    assert!(matches!(
        err,
        PipelineError::Input(SubjectError::InputNotFound(_))
    ));
    assert!(!case.output_dir.exists());
    assert!(fake.entries().is_empty());
}

#[tokio::test]
async fn stage_failure_carries_stage_identity() {
    let case = Case::seed();
    let fake = Fake::failing_registration();

    let err = case.run(&fake).await.expect_err("registration must fail");
    match &err {
        PipelineError::Stage { stage, .. } => assert_eq!(*stage, PipelineStage::Registration),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("registration stage failed"));

    // the failure aborts the remainder: nothing was segmented or measured
    assert!(!fake.entries().iter().any(|e| e.starts_with("segment:")));
    assert!(!fake.entries().iter().any(|e| e.starts_with("volume:")));
}

#[tokio::test]
async fn qc_failure_degrades_to_warning_by_default() {
    let case = Case::seed();
    let fake = Fake::failing_qc();

    let report = case.run(&fake).await.expect("QC failure must not abort");
    let qc = report
        .stages
        .iter()
        .find(|s| s.stage == PipelineStage::QcRendering)
        .unwrap();
    assert_eq!(qc.status, StageStatus::Warned);

    // volumetrics still ran and wrote both tables
    assert!(case.output_dir.join("Tissue_and_csf_volumes.csv").is_file());
    assert!(case.output_dir.join("All_volumes.csv").is_file());
}

#[tokio::test]
async fn qc_failure_aborts_when_configured_fatal() {
    let case = Case::seed();
    let fake = Fake::failing_qc();

    let err = case
        .engine(&fake, true)
        .run(&case.request())
        .await
        .expect_err("qc.fatal must abort");
    assert!(matches!(
        err,
        PipelineError::Stage {
            stage: PipelineStage::QcRendering,
            ..
        }
    ));
}

#[tokio::test]
async fn volume_tables_are_deterministic_across_runs() {
    let first = Case::seed();
    let second = Case::seed();
    first.run(&Fake::new()).await.unwrap();
    second.run(&Fake::new()).await.unwrap();

    for table in ["Tissue_and_csf_volumes.csv", "All_volumes.csv"] {
        let a = std::fs::read(first.output_dir.join(table)).unwrap();
        let b = std::fs::read(second.output_dir.join(table)).unwrap();
        assert_eq!(a, b, "{table} differs between runs");
    }
}

#[tokio::test]
async fn refinement_redistributes_without_creating_mass() {
    let case = Case::seed();
    case.run(&Fake::new()).await.unwrap();

    let total = |file: &str| -> f64 {
        std::fs::read_to_string(case.output_dir.join(file))
            .unwrap()
            .lines()
            .skip(1)
            .map(|line| line.rsplit(',').next().unwrap().parse::<f64>().unwrap())
            .sum()
    };

    let two_class = total("Tissue_and_csf_volumes.csv");
    let four_class = total("All_volumes.csv");
    assert!(four_class <= two_class + 1e-6);
}

#[tokio::test]
async fn empty_output_directory_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir_all(out.join("qc")).unwrap();

    // directories alone do not count as liveness
    let err = verify_output_liveness(&out).expect_err("empty output must fail");
    assert!(matches!(err, PipelineError::EmptyOutput(_)));

    std::fs::write(out.join("qc").join("montage.png"), b"png").unwrap();
    verify_output_liveness(&out).expect("nested file counts");
}

#[tokio::test]
async fn run_report_records_every_stage() {
    let case = Case::seed();
    let report = case.run(&Fake::new()).await.unwrap();

    assert_eq!(report.stages.len(), PipelineStage::ALL.len());
    let recorded: Vec<_> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(recorded, PipelineStage::ALL.to_vec());
    assert!(report.ended_at.is_some());

    let raw = std::fs::read_to_string(case.output_dir.join("sub-01_T2w_run_report.json")).unwrap();
    assert!(raw.contains("\"tissue-segmentation\""));
}
