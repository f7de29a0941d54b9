// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pipeline Configuration Manifest
//!
//! YAML manifest covering the three things a deployment actually varies:
//! where the age-keyed template bundles live, which binary backs each
//! external capability, and whether QC rendering failures abort the run.
//! Every field is defaulted so an empty file (or no file) is a valid
//! configuration.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse external YAML -> validated configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Binary name (or absolute path) per external capability
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    pub brain_extractor: String,
    pub registration: String,
    pub apply_transforms: String,
    pub segmenter: String,
    pub fslmaths: String,
    pub fslmerge: String,
    pub fslstats: String,
    pub slicer: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            brain_extractor: "hd-bet".to_string(),
            registration: "antsRegistrationSyN.sh".to_string(),
            apply_transforms: "antsApplyTransforms".to_string(),
            segmenter: "Atropos".to_string(),
            fslmaths: "fslmaths".to_string(),
            fslmerge: "fslmerge".to_string(),
            fslstats: "fslstats".to_string(),
            slicer: "slicer".to_string(),
        }
    }
}

impl ToolPaths {
    /// (capability, configured binary) pairs for preflight checks
    pub fn all(&self) -> [(&'static str, &str); 8] {
        [
            ("brain-extractor", &self.brain_extractor),
            ("registration", &self.registration),
            ("apply-transforms", &self.apply_transforms),
            ("segmenter", &self.segmenter),
            ("fslmaths", &self.fslmaths),
            ("fslmerge", &self.fslmerge),
            ("fslstats", &self.fslstats),
            ("slicer", &self.slicer),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QcConfig {
    /// Abort the run when montage rendering fails. Off by default: the
    /// volume tables do not depend on QC images.
    pub fatal: bool,
}

#[allow(clippy::derivable_impls)]
impl Default for QcConfig {
    fn default() -> Self {
        Self { fatal: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrationConfig {
    /// Solver transform preset ("s" = rigid + affine + deformable SyN)
    pub transform: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            transform: "s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentationConfig {
    /// Prior probability weight handed to the segmenter
    pub prior_weight: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self { prior_weight: 0.25 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory holding one template bundle directory per age token
    pub templates_root: PathBuf,
    pub tools: ToolPaths,
    pub qc: QcConfig,
    pub registration: RegistrationConfig,
    pub segmentation: SegmentationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            templates_root: PathBuf::from("/usr/local/share/neoseg/templates"),
            tools: ToolPaths::default(),
            qc: QcConfig::default(),
            registration: RegistrationConfig::default(),
            segmentation: SegmentationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a manifest file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the effective configuration
    ///
    /// Precedence: explicit path (CLI flag / env, must exist) > user config
    /// file (`~/.config/neoseg/config.yaml`, if present) > built-in
    /// defaults. Returns the source path when a file was read.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        if let Some(path) = Self::user_config_path() {
            if path.is_file() {
                return Ok((Self::load(&path)?, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("neoseg").join("config.yaml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.templates_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "templates_root must not be empty".to_string(),
            ));
        }
        for (capability, program) in self.tools.all() {
            if program.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "tool binary for '{capability}' must not be empty"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.segmentation.prior_weight) {
            return Err(ConfigError::Invalid(format!(
                "segmentation.prior_weight must be in [0,1], got {}",
                self.segmentation.prior_weight
            )));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).expect("config serialization is infallible")
    }
}
