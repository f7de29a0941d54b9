// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod hdbet;
pub mod ants;
pub mod fsl;

pub use ants::{AntsApplyTransforms, AntsRegistrationSolver, AtroposSegmenter};
pub use fsl::{FslImageAlgebra, FslVolumeStatistics, SlicerMontageRenderer};
pub use hdbet::HdBetExtractor;
