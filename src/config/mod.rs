// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod args;
mod loader;
pub mod consts;

pub use args::{is_source_flag, is_target_flag, value_as_text, PipelineArgs};
pub use loader::{load_settings, EngineSettings};
