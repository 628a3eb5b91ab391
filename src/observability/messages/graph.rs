// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph assembly: descriptor parsing, override binding,
//! token substitution and tree wiring.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// An explicit stage reference names no stage; the edge is skipped.
///
/// # Log Level
/// `warn!` - Unexpected but recoverable
///
/// # Example
/// ```
/// use the_geoflow::observability::messages::graph::DanglingStageReference;
///
/// let msg = DanglingStageReference {
///     stage_id: "writer",
///     reference: "reader-2",
///     edge: "inputStageId",
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct DanglingStageReference<'a> {
    pub stage_id: &'a str,
    pub reference: &'a str,
    pub edge: &'a str,
}

impl Display for DanglingStageReference<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "The stageId \"{}\" referenced by {} of stage \"{}\" was not found in the pipeline",
            self.reference, self.edge, self.stage_id
        )
    }
}

impl StructuredLog for DanglingStageReference<'_> {
    fn log(&self) {
        tracing::warn!(
            stage_id = self.stage_id,
            reference = self.reference,
            edge = self.edge,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "dangling_stage_reference",
            span_name = name,
            stage_id = self.stage_id,
            reference = self.reference,
            edge = self.edge,
        )
    }
}

/// A `--module.<stageId>.<attr>` override was bound to a stage.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct OverrideApplied<'a> {
    pub stage_id: &'a str,
    pub attribute: &'a str,
    pub value: &'a serde_json::Value,
}

impl Display for OverrideApplied<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Assigning parameter of stage \"{}\": {}={}",
            self.stage_id, self.attribute, self.value
        )
    }
}

impl StructuredLog for OverrideApplied<'_> {
    fn log(&self) {
        tracing::debug!(
            stage_id = self.stage_id,
            attribute = self.attribute,
            value = %self.value,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "override_applied",
            span_name = name,
            stage_id = self.stage_id,
            attribute = self.attribute,
        )
    }
}

/// A stage was created for a `-source` or `-target` override.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct CapabilityStageInserted<'a> {
    pub stage_id: &'a str,
    pub class_name: &'a str,
    pub data_source: &'a str,
    pub position: usize,
}

impl Display for CapabilityStageInserted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Inserted {} stage \"{}\" for data source \"{}\" at position {}",
            self.class_name, self.stage_id, self.data_source, self.position
        )
    }
}

impl StructuredLog for CapabilityStageInserted<'_> {
    fn log(&self) {
        tracing::debug!(
            stage_id = self.stage_id,
            class_name = self.class_name,
            data_source = self.data_source,
            position = self.position,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "capability_stage_inserted",
            span_name = name,
            stage_id = self.stage_id,
            class_name = self.class_name,
        )
    }
}

/// The layer name of a connection string could not be derived, so
/// `FEATURE_CLASS` stays undefined.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct LayerNameUnresolved<'a> {
    pub connection: &'a str,
}

impl Display for LayerNameUnresolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Unknown layer name parsing of the connection string \"{}\"", self.connection)
    }
}

impl StructuredLog for LayerNameUnresolved<'_> {
    fn log(&self) {
        tracing::debug!(connection = self.connection, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("layer_name_unresolved", span_name = name, connection = self.connection)
    }
}

/// The stage graph is assembled.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct GraphBuilt {
    pub stage_count: usize,
    pub root_count: usize,
    pub edge_count: usize,
}

impl Display for GraphBuilt {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline graph built: {} stages, {} top-level, {} edges",
            self.stage_count, self.root_count, self.edge_count
        )
    }
}

impl StructuredLog for GraphBuilt {
    fn log(&self) {
        tracing::debug!(
            stage_count = self.stage_count,
            root_count = self.root_count,
            edge_count = self.edge_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "graph_built",
            span_name = name,
            stage_count = self.stage_count,
            edge_count = self.edge_count,
        )
    }
}
