// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod schema;

pub use config::{ConfigError, SettingsError};
pub use execution::{PipelineError, StageError};
pub use schema::SchemaError;
