// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PipelineArgs;
use crate::errors::SettingsError;

/// Engine-level settings shared by every pipeline run of one process.
///
/// Loaded from YAML or TOML, chosen by file extension. Every field is
/// optional; command-line flags take precedence over the file.
///
/// # Example
/// ```yaml
/// log_level: debug
/// temp_path: /var/tmp/geoflow
/// pipeline_args:
///   "--pipeline.DATA_FOLDER": /data
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    /// Parent directory of the per-run scratch directories.
    pub temp_path: Option<PathBuf>,
    pub ui_mode: bool,
    /// Overrides applied under the command-line ones.
    pub pipeline_args: BTreeMap<String, String>,
}

impl EngineSettings {
    /// Add the settings' default overrides to `args` without replacing any
    /// override already present.
    pub fn apply_defaults(&self, args: &mut PipelineArgs) {
        for (key, value) in &self.pipeline_args {
            args.insert_default(key, value.as_str());
        }
    }
}

/// Load settings from a `.yaml`/`.yml` or `.toml` file.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<EngineSettings, SettingsError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let content = fs::read_to_string(path)?;
    match extension.as_str() {
        "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
        "toml" => Ok(toml::from_str(&content)?),
        _ => Err(SettingsError::UnsupportedFormat(path.display().to_string())),
    }
}
