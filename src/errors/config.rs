// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while assembling a pipeline graph or loading settings.

use thiserror::Error;

/// Configuration errors detected while parsing descriptors, applying overrides
/// or wiring the stage graph.
///
/// All of these abort graph assembly (or the starting phase of a run) before
/// any record flows. Dangling `inputStageId`/`outputStageId` references are not
/// represented here: those are logged and skipped by the builder.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The `type` of a descriptor matches no registered stage and no plugin location.
    #[error("The stage type \"{0}\" is not supported")]
    UnsupportedStageType(String),

    /// No registered source stage accepts the `-source` data source.
    #[error("Input data source \"{0}\" not supported")]
    UnsupportedInput(String),

    /// No registered sink stage can create the `-target` data source.
    #[error("Output data source \"{0}\" not supported")]
    UnsupportedOutput(String),

    /// A stage descriptor is malformed (not an object, missing `type`, ...).
    #[error("Invalid stage descriptor: {0}")]
    InvalidDescriptor(String),

    /// A `--module.<stageId>.<attr>` value cannot be coerced to the attribute type.
    #[error("Invalid value \"{value}\" for parameter \"{attribute}\" of stage \"{stage_id}\": {reason}")]
    InvalidOverride {
        stage_id: String,
        attribute: String,
        value: String,
        reason: String,
    },

    /// A stage rejected one of its declared parameters at bind time.
    #[error("Invalid parameter \"{name}\" of stage \"{stage_id}\": {reason}")]
    InvalidParameter {
        stage_id: String,
        name: String,
        reason: String,
    },

    /// A stage identifier does not exist in the current pipeline.
    #[error("Stage \"{0}\" not found in current pipeline")]
    StageNotFound(String),

    /// The resolved input edges form a cycle through the named stage.
    #[error("Cyclic stage graph detected at stage \"{0}\"")]
    CyclicGraph(String),

    /// A plugin module failed while registering its stages.
    #[error("Plugin \"{plugin}\" failed to register: {reason}")]
    PluginFailed { plugin: String, reason: String },
}

/// Errors loading an [`EngineSettings`](crate::config::EngineSettings) file.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error reading settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML settings: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid TOML settings: {0}")]
    Toml(#[from] toml::de::Error),

    /// The settings file extension is neither YAML nor TOML.
    #[error("Unsupported settings file format: \"{0}\"")]
    UnsupportedFormat(String),
}
