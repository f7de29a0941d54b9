// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod run;
pub mod config;
pub mod tools;

pub use config::ConfigCommand;
pub use run::RunArgs;
pub use tools::ToolsCommand;
