// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod subject;
pub mod template;
pub mod labels;
pub mod workspace;
pub mod toolchain;
pub mod stage;
pub mod volume_report;

pub use subject::{InputVolume, SubjectId, SubjectError};
pub use template::{AgeToken, TemplateBundle, TemplateError};
pub use labels::{LabelSpec, RefinedLabel, TissueCsfLabel};
pub use workspace::RunWorkspace;
pub use toolchain::{
    BrainExtractor, ImageAlgebra, Interpolation, MontageRenderer, PriorResampler,
    RegistrationSolver, RegistrationTransform, TissueSegmenter, ToolError, VolumeStatistics,
    VoxelVolume,
};
pub use stage::{PipelineError, PipelineStage};
pub use volume_report::{VolumeRow, VolumeTable};
