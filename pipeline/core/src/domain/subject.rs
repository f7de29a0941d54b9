// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Subject Input Resolution
//!
//! Validates the raw input volume and derives the subject identifier that
//! prefixes every final output artifact.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Input pre-flight checks and subject identity

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Input resolution errors (all fatal, pre-flight)
#[derive(Debug, Error)]
pub enum SubjectError {
    #[error("input volume not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("input volume {} is not a NIfTI image (expected .nii or .nii.gz)", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("cannot derive a subject id from {}", .0.display())]
    EmptyBasename(PathBuf),
}

/// Subject identifier derived from the input basename
///
/// `sub-001_T2w.nii.gz` resolves to `sub-001_T2w`; the id prefixes every
/// subject-facing output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated raw input volume
///
/// Construction performs the pipeline's only input pre-flight: the file must
/// exist and carry a recognized volumetric-image extension. The input is
/// never mutated.
#[derive(Debug, Clone)]
pub struct InputVolume {
    path: PathBuf,
    subject: SubjectId,
}

impl InputVolume {
    /// Resolve and validate an input volume path
    pub fn resolve(path: impl Into<PathBuf>) -> Result<Self, SubjectError> {
        let path = path.into();

        if !path.is_file() {
            return Err(SubjectError::InputNotFound(path));
        }

        let stem = nifti_stem(&path).ok_or_else(|| SubjectError::UnsupportedExtension(path.clone()))?;
        if stem.is_empty() {
            return Err(SubjectError::EmptyBasename(path));
        }

        let subject = SubjectId(stem.to_string());
        Ok(Self { path, subject })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }
}

/// Strip a NIfTI extension from the basename, if present
fn nifti_stem(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(".nii.gz")
        .or_else(|| name.strip_suffix(".nii"))
}
