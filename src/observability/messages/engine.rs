// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pipeline run lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Run start, completion and failure
//! * Stage starting/finishing hooks and shared-consumer counting
//! * Best-effort teardown after a run
//! * Partial-graph extraction

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A pipeline run is starting.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_geoflow::observability::messages::engine::RunStarted;
///
/// let msg = RunStarted {
///     stage_count: 4,
///     sink_count: 1,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RunStarted {
    pub stage_count: usize,
    pub sink_count: usize,
}

impl Display for RunStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting pipeline run: {} stages, {} sinks",
            self.stage_count, self.sink_count
        )
    }
}

impl StructuredLog for RunStarted {
    fn log(&self) {
        tracing::info!(
            stage_count = self.stage_count,
            sink_count = self.sink_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline_run",
            span_name = name,
            stage_count = self.stage_count,
            sink_count = self.sink_count,
        )
    }
}

/// A pipeline run completed successfully.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunCompleted {
    pub sink_count: usize,
    pub record_count: usize,
    pub duration: Duration,
}

impl Display for RunCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline run completed: {} sinks drained, {} records in {:?}",
            self.sink_count, self.record_count, self.duration
        )
    }
}

impl StructuredLog for RunCompleted {
    fn log(&self) {
        tracing::info!(
            sink_count = self.sink_count,
            record_count = self.record_count,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline_run_completed",
            span_name = name,
            sink_count = self.sink_count,
            record_count = self.record_count,
            duration = ?self.duration,
        )
    }
}

/// A pipeline run failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct RunFailed<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for RunFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pipeline run failed: {}", self.error)
    }
}

impl StructuredLog for RunFailed<'_> {
    fn log(&self) {
        tracing::error!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("pipeline_run_failed", span_name = name, error = %self.error)
    }
}

/// The pipeline has no sink stage, so a run does nothing.
///
/// # Log Level
/// `warn!` - Unexpected but recoverable
pub struct NoSinkStages {
    pub stage_count: usize,
}

impl Display for NoSinkStages {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.stage_count == 0 {
            write!(f, "There is no stage, the pipeline does nothing")
        } else {
            write!(f, "There is no output stage, the pipeline does nothing")
        }
    }
}

impl StructuredLog for NoSinkStages {
    fn log(&self) {
        tracing::warn!(stage_count = self.stage_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("no_sink_stages", span_name = name, stage_count = self.stage_count)
    }
}

/// A stage's starting hook is about to run.
///
/// # Log Level
/// `debug!` - Lifecycle transition
pub struct StageStarting<'a> {
    pub stage_id: &'a str,
    pub class_name: &'a str,
    pub input_count: usize,
}

impl Display for StageStarting<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting stage '{}' ({}) with {} inputs",
            self.stage_id, self.class_name, self.input_count
        )
    }
}

impl StructuredLog for StageStarting<'_> {
    fn log(&self) {
        tracing::debug!(
            stage_id = self.stage_id,
            class_name = self.class_name,
            input_count = self.input_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "stage_starting",
            span_name = name,
            stage_id = self.stage_id,
            class_name = self.class_name,
        )
    }
}

/// An already-started stage was reached through another consumer path.
///
/// # Log Level
/// `debug!` - Lifecycle transition
pub struct StageShared<'a> {
    pub stage_id: &'a str,
    pub consumers: usize,
}

impl Display for StageShared<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' already started, now shared by {} consumers",
            self.stage_id, self.consumers
        )
    }
}

impl StructuredLog for StageShared<'_> {
    fn log(&self) {
        tracing::debug!(stage_id = self.stage_id, consumers = self.consumers, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "stage_shared",
            span_name = name,
            stage_id = self.stage_id,
            consumers = self.consumers,
        )
    }
}

/// A stage's last consumer finished and its finishing hook ran.
///
/// # Log Level
/// `debug!` - Lifecycle transition
pub struct StageFinished<'a> {
    pub stage_id: &'a str,
    pub forced: bool,
}

impl Display for StageFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.forced {
            write!(f, "Stage '{}' force-finalized at run teardown", self.stage_id)
        } else {
            write!(f, "Stage '{}' finished", self.stage_id)
        }
    }
}

impl StructuredLog for StageFinished<'_> {
    fn log(&self) {
        tracing::debug!(stage_id = self.stage_id, forced = self.forced, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "stage_finished",
            span_name = name,
            stage_id = self.stage_id,
            forced = self.forced,
        )
    }
}

/// A teardown step failed; the run keeps cleaning up the remaining stages.
///
/// # Log Level
/// `warn!` - Unexpected but recoverable
pub struct TeardownFailed<'a> {
    pub stage_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for TeardownFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Teardown of stage '{}' failed: {}", self.stage_id, self.error)
    }
}

impl StructuredLog for TeardownFailed<'_> {
    fn log(&self) {
        tracing::warn!(stage_id = self.stage_id, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "teardown_failed",
            span_name = name,
            stage_id = self.stage_id,
            error = %self.error,
        )
    }
}

/// An embedded `fileData` payload was decoded for the duration of a run.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct EmbeddedFileDecoded<'a> {
    pub stage_id: &'a str,
    pub path: &'a std::path::Path,
    pub byte_count: usize,
}

impl Display for EmbeddedFileDecoded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Decoded embedded file data of stage '{}' to {} ({} bytes)",
            self.stage_id,
            self.path.display(),
            self.byte_count
        )
    }
}

impl StructuredLog for EmbeddedFileDecoded<'_> {
    fn log(&self) {
        tracing::debug!(
            stage_id = self.stage_id,
            path = %self.path.display(),
            byte_count = self.byte_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "embedded_file_decoded",
            span_name = name,
            stage_id = self.stage_id,
            path = %self.path.display(),
        )
    }
}

/// A single stage's schema or data is being extracted.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ExtractionStarted<'a> {
    pub stage_id: &'a str,
    pub mode: &'a str,
}

impl Display for ExtractionStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Extracting {} of stage '{}'", self.mode, self.stage_id)
    }
}

impl StructuredLog for ExtractionStarted<'_> {
    fn log(&self) {
        tracing::info!(stage_id = self.stage_id, mode = self.mode, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "extraction",
            span_name = name,
            stage_id = self.stage_id,
            mode = self.mode,
        )
    }
}
