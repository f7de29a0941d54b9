// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Age-Matched Template Bundles
//!
//! An age token selects one bundle directory under the configured templates
//! root. Every template-space reference object the pipeline consumes lives
//! in that directory and is existence-checked up front, so a missing prior
//! fails before any external tool runs.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Template bundle resolution and validation

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bundle resolution errors
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid age token '{0}': must be a non-empty directory name")]
    InvalidAgeToken(String),

    #[error("no template bundle for age '{age}' under {}", .root.display())]
    BundleNotFound { age: String, root: PathBuf },

    #[error("template bundle {} is missing '{member}'", .bundle.display())]
    MissingMember { bundle: PathBuf, member: String },
}

/// Validated age token naming a template bundle directory
///
/// Tokens are plain directory names ("36w", "06mo", "12mo"); anything that
/// would escape the templates root is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgeToken(String);

impl AgeToken {
    pub fn new(token: impl Into<String>) -> Result<Self, TemplateError> {
        let token = token.into();
        if token.is_empty()
            || token == "."
            || token == ".."
            || token.contains('/')
            || token.contains('\\')
        {
            return Err(TemplateError::InvalidAgeToken(token));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolved template-space reference objects for one age bracket
///
/// All members are pre-registered to the same reference template space.
/// Prior numbering is positional and load-bearing: class 1 = tissue,
/// class 2 = CSF; every downstream composition step depends on it.
#[derive(Debug, Clone)]
pub struct TemplateBundle {
    root: PathBuf,
    pub template: PathBuf,
    pub brain_mask: PathBuf,
    pub tissue_prior: PathBuf,
    pub csf_prior: PathBuf,
    pub ventricle_mask: PathBuf,
    pub subcortical_mask: PathBuf,
}

impl TemplateBundle {
    /// Resolve the bundle directory for an age token, checking every member
    pub fn resolve(templates_root: &Path, age: &AgeToken) -> Result<Self, TemplateError> {
        let root = templates_root.join(age.as_str());
        if !root.is_dir() {
            return Err(TemplateError::BundleNotFound {
                age: age.as_str().to_string(),
                root: templates_root.to_path_buf(),
            });
        }

        Ok(Self {
            template: member(&root, "template")?,
            brain_mask: member(&root, "template_brain_mask")?,
            tissue_prior: member(&root, "prior1")?,
            csf_prior: member(&root, "prior2")?,
            ventricle_mask: member(&root, "ventricle_mask")?,
            subcortical_mask: member(&root, "subcortical_gm_mask")?,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Continuous priors in class order (1 = tissue, 2 = CSF)
    pub fn priors(&self) -> [&Path; 2] {
        [&self.tissue_prior, &self.csf_prior]
    }
}

/// Locate a bundle member, accepting `.nii.gz` or uncompressed `.nii`
fn member(bundle: &Path, name: &str) -> Result<PathBuf, TemplateError> {
    let gz = bundle.join(format!("{name}.nii.gz"));
    if gz.is_file() {
        return Ok(gz);
    }
    let plain = bundle.join(format!("{name}.nii"));
    if plain.is_file() {
        return Ok(plain);
    }
    Err(TemplateError::MissingMember {
        bundle: bundle.to_path_buf(),
        member: format!("{name}.nii.gz"),
    })
}
