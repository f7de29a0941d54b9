// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Run Report
//!
//! Machine-readable record of one pipeline run: identity, per-stage outcome
//! and wall-clock, and the final artifact paths. Written as JSON next to
//! the other outputs so downstream tooling can pick it up without scraping
//! logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::domain::stage::PipelineStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Completed,
    /// Non-fatal failure (QC rendering with `qc.fatal` off)
    Warned,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: PipelineStage,
    pub status: StageStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Final artifact paths of a completed run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOutputs {
    pub brain: Option<PathBuf>,
    pub brain_mask: Option<PathBuf>,
    pub tissue_csf_atlas: Option<PathBuf>,
    pub refined_atlas: Option<PathBuf>,
    pub tissue_csf_volumes: Option<PathBuf>,
    pub all_volumes: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub subject: String,
    pub age: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageRecord>,
    pub outputs: RunOutputs,
}

impl RunReport {
    pub fn begin(subject: &str, age: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            subject: subject.to_string(),
            age: age.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            stages: Vec::new(),
            outputs: RunOutputs::default(),
        }
    }

    pub fn record(
        &mut self,
        stage: PipelineStage,
        status: StageStatus,
        started_at: DateTime<Utc>,
        duration: std::time::Duration,
        detail: Option<String>,
    ) {
        self.stages.push(StageRecord {
            stage,
            status,
            started_at,
            duration_ms: duration.as_millis() as u64,
            detail,
        });
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
