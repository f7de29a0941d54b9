// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Volume Reporting
//!
//! For each label of a given table: binarize the atlas at exactly that
//! label value, measure voxel count and physical volume over the binarized
//! mask, and append one row. The two tables (2-class, 4-class) are
//! assembled independently and never merged.

use std::path::Path;
use tracing::debug;

use crate::domain::labels::LabelSpec;
use crate::domain::toolchain::{ImageAlgebra, ToolError, VolumeStatistics};
use crate::domain::volume_report::VolumeTable;
use crate::domain::workspace::RunWorkspace;

/// Measure every label of `table` on `atlas`, in table order
pub async fn measure_labels(
    algebra: &dyn ImageAlgebra,
    stats: &dyn VolumeStatistics,
    ws: &RunWorkspace,
    atlas: &Path,
    table: &[LabelSpec],
) -> Result<VolumeTable, ToolError> {
    let mut volumes = VolumeTable::default();
    for spec in table {
        let binarized = ws.scratch(&format!("label_{}_{}.nii.gz", spec.index, spec.name));
        algebra.extract_label(atlas, spec.index, &binarized).await?;
        let measured = stats.volume(&binarized).await?;
        debug!(
            label = spec.name,
            index = spec.index,
            voxels = measured.voxels,
            cubic_mm = measured.cubic_mm,
            "Measured label volume"
        );
        volumes.push(spec.name, measured);
    }
    Ok(volumes)
}

/// Write a table to its CSV file
pub fn write_table(path: &Path, table: &VolumeTable) -> std::io::Result<()> {
    std::fs::write(path, table.to_csv())
}
