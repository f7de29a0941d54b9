// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod process;
pub mod tools;
pub mod config;

pub use config::{ConfigError, PipelineConfig, QcConfig, RegistrationConfig, SegmentationConfig, ToolPaths};
pub use process::{ToolInvocation, ToolOutput};
