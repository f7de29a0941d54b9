// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! hd-bet Skull-Stripper Adapter
//!
//! Wraps the HD-BET deep-learning brain extractor behind the
//! `BrainExtractor` capability. HD-BET writes the binary mask next to the
//! stripped image with a `_mask` suffix; the run workspace names its mask
//! artifact to match, so the adapter only has to verify both files.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::toolchain::{BrainExtractor, ToolError};
use crate::infrastructure::process::ToolInvocation;

pub struct HdBetExtractor {
    program: String,
}

impl HdBetExtractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl BrainExtractor for HdBetExtractor {
    async fn extract(
        &self,
        raw: &Path,
        brain_out: &Path,
        mask_out: &Path,
    ) -> Result<(), ToolError> {
        ToolInvocation::new(&self.program)
            .arg("-i")
            .arg(raw)
            .arg("-o")
            .arg(brain_out)
            .arg("--save_bet_mask")
            .expect_output(brain_out)
            .expect_output(mask_out)
            .run()
            .await?;
        Ok(())
    }
}
