// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # neoseg pipeline core
//!
//! Stage-sequencing engine for infant-brain MRI segmentation. Every
//! computational step (skull-stripping, deformable registration, statistical
//! tissue classification, image algebra, volumetrics, montage rendering) is
//! delegated to an external neuroimaging tool invoked as a subprocess; this
//! crate owns the step ordering, the intermediate artifact naming, the
//! label-algebra composition, and the assembly of the final volume tables.
//!
//! # Architecture
//!
//! - `domain` - subject/template/label/workspace value objects and the
//!   capability traits behind which the external tools sit
//! - `application` - the `SegmentationPipeline` engine and its stage
//!   compositions (refinement, volumetrics, run report)
//! - `infrastructure` - subprocess runner, vendor tool adapters, and the
//!   YAML configuration manifest

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
