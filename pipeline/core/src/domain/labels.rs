// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Enumerated Label Tables
//!
//! Label meaning is attached to data, not inferred from call order: atlas
//! construction derives its stacking order from these enums, and the volume
//! reporter iterates the same tables. Reordering a variant changes the
//! stacking order and the reported rows together, so the label-index
//! semantics cannot silently drift apart.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Label-index semantics for both atlases

use serde::{Deserialize, Serialize};

/// One row of a label table: display name + atlas label value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSpec {
    pub name: &'static str,
    pub index: u32,
}

/// Labels of the 2-class atlas (background = 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TissueCsfLabel {
    Tissue,
    Csf,
}

impl TissueCsfLabel {
    /// Ascending atlas order; position here IS the stacking position
    pub const ALL: [Self; 2] = [Self::Tissue, Self::Csf];

    pub fn index(self) -> u32 {
        match self {
            Self::Tissue => 1,
            Self::Csf => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tissue => "Tissue",
            Self::Csf => "CSF",
        }
    }

    pub fn table() -> Vec<LabelSpec> {
        Self::ALL
            .iter()
            .map(|label| LabelSpec {
                name: label.name(),
                index: label.index(),
            })
            .collect()
    }
}

/// Labels of the refined 4-class atlas (background = 0)
///
/// Tissue here means non-subcortical tissue and CSF means non-ventricular
/// CSF; the refinement stage redistributes the 2-class posteriors into these
/// four classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefinedLabel {
    Tissue,
    SubcorticalGm,
    Csf,
    Ventricles,
}

impl RefinedLabel {
    /// Ascending atlas order; position here IS the stacking position
    pub const ALL: [Self; 4] = [
        Self::Tissue,
        Self::SubcorticalGm,
        Self::Csf,
        Self::Ventricles,
    ];

    pub fn index(self) -> u32 {
        match self {
            Self::Tissue => 1,
            Self::SubcorticalGm => 2,
            Self::Csf => 3,
            Self::Ventricles => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tissue => "Tissue",
            Self::SubcorticalGm => "Subcortical_GM",
            Self::Csf => "CSF",
            Self::Ventricles => "Ventricles",
        }
    }

    pub fn table() -> Vec<LabelSpec> {
        Self::ALL
            .iter()
            .map(|label| LabelSpec {
                name: label.name(),
                index: label.index(),
            })
            .collect()
    }
}
