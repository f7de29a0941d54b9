// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Subprocess Tool Invocation
//!
//! Every external tool call goes through `ToolInvocation`: spawn, block on
//! exit, capture both streams, map a nonzero status to `ToolError`, then
//! verify every declared output file actually exists before the next stage
//! is allowed to read it. There is no sleep-based wait for write
//! completion: a declared output either exists at exit or the call fails.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Uniform subprocess boundary for all tool adapters

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::domain::toolchain::ToolError;

/// Captured streams of a successful tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// One external tool call, built up adapter-side and awaited to completion
#[derive(Debug)]
pub struct ToolInvocation {
    program: String,
    args: Vec<OsString>,
    expected_outputs: Vec<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            expected_outputs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Declare a file the tool must have written for the call to count as
    /// successful
    pub fn expect_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.expected_outputs.push(path.into());
        self
    }

    pub fn expect_outputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.expected_outputs
            .extend(paths.into_iter().map(Into::into));
        self
    }

    /// Spawn the tool and block until it exits
    pub async fn run(self) -> Result<ToolOutput, ToolError> {
        debug!(program = %self.program, args = ?self.args, "Invoking external tool");

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(ToolError::NonZeroExit {
                program: self.program,
                code: output.status.code(),
                stderr,
            });
        }

        self.verify_outputs()?;

        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr,
        })
    }

    fn verify_outputs(&self) -> Result<(), ToolError> {
        for path in &self.expected_outputs {
            if !path.exists() {
                return Err(ToolError::MissingOutput {
                    program: self.program.clone(),
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Append a suffix to a path prefix without inserting a separator
///
/// Registration solvers compose their artifact names this way:
/// `template_to_subject_` + `1Warp.nii.gz`.
pub fn suffixed(prefix: &Path, suffix: &str) -> PathBuf {
    let mut os = prefix.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}
