// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Volume Tables
//!
//! The pipeline's primary quantitative output: one `name,volume` row per
//! label of a given atlas under the fixed `Volume` header. Tables are
//! created fresh each run and never merged across runs; the 2-class and
//! 4-class tables have disjoint vocabularies and are not cross-validated
//! against each other.

use serde::{Deserialize, Serialize};

use crate::domain::toolchain::VoxelVolume;

/// One measured label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRow {
    pub name: String,
    pub voxels: u64,
    pub cubic_mm: f64,
}

/// All measured labels of one atlas, in label-table order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeTable {
    pub rows: Vec<VolumeRow>,
}

impl VolumeTable {
    pub fn push(&mut self, name: &str, measured: VoxelVolume) {
        self.rows.push(VolumeRow {
            name: name.to_string(),
            voxels: measured.voxels,
            cubic_mm: measured.cubic_mm,
        });
    }

    /// CSV rendering: `Volume` header, then `name,volume` rows with the
    /// statistics tool's six-decimal volume formatting
    pub fn to_csv(&self) -> String {
        let mut out = String::from("Volume\n");
        for row in &self.rows {
            out.push_str(&format!("{},{:.6}\n", row.name, row.cubic_mm));
        }
        out
    }

    /// Total physical volume across all rows
    pub fn total_cubic_mm(&self) -> f64 {
        self.rows.iter().map(|r| r.cubic_mm).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_matches_fixed_format() {
        let mut table = VolumeTable::default();
        table.push(
            "Tissue",
            VoxelVolume {
                voxels: 1000,
                cubic_mm: 1234.5,
            },
        );
        table.push(
            "CSF",
            VoxelVolume {
                voxels: 250,
                cubic_mm: 312.25,
            },
        );

        assert_eq!(
            table.to_csv(),
            "Volume\nTissue,1234.500000\nCSF,312.250000\n"
        );
    }

    #[test]
    fn empty_table_is_header_only() {
        assert_eq!(VolumeTable::default().to_csv(), "Volume\n");
    }

    #[test]
    fn totals_sum_rows() {
        let mut table = VolumeTable::default();
        table.push(
            "Tissue",
            VoxelVolume {
                voxels: 10,
                cubic_mm: 10.0,
            },
        );
        table.push(
            "CSF",
            VoxelVolume {
                voxels: 5,
                cubic_mm: 5.0,
            },
        );
        assert!((table.total_cubic_mm() - 15.0).abs() < 1e-9);
    }
}
