// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while a pipeline runs.

use crate::errors::{ConfigError, SchemaError};
use thiserror::Error;

/// Failure raised from inside a stage hook or a stage's record stream.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A parameter is missing or has a value the stage cannot use.
    #[error("Invalid parameter \"{name}\": {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A configured limit was exceeded by the data flowing through the stage.
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// A hook was invoked outside of a running pipeline.
    #[error("Stage hook invoked outside of a running pipeline: {0}")]
    NotRunning(String),

    /// A nested engine operation (side-channel resolution) failed.
    #[error(transparent)]
    Pipeline(#[from] Box<PipelineError>),

    #[error("{0}")]
    Other(String),
}

/// Umbrella error returned by every public engine operation.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A stage hook failed; carries the stage identity and the hook name.
    #[error("Stage \"{stage_id}\" failed in {hook}: {source}")]
    StageFailed {
        stage_id: String,
        hook: &'static str,
        #[source]
        source: StageError,
    },

    /// A stage's record stream yielded an error.
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Wrap a hook failure with the identity of the stage that raised it.
    pub fn stage_failed(stage_id: &str, hook: &'static str, source: StageError) -> Self {
        PipelineError::StageFailed {
            stage_id: stage_id.to_string(),
            hook,
            source,
        }
    }
}

impl From<PipelineError> for StageError {
    fn from(err: PipelineError) -> Self {
        StageError::Pipeline(Box::new(err))
    }
}
