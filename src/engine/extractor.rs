// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Partial-graph extraction ("preview this stage").
//!
//! The forest is rewired in place: a capture sink is spliced in right after
//! the target stage, the target's original consumers are cut off and every
//! sink of the original graph is dropped from the structure. The engine then
//! runs the rewired graph and the captured schema or records are returned.
//! Nodes, edges and root list are restored afterwards whatever the outcome.

use serde_json::Value;
use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use uuid::Uuid;

use super::context::RunContext;
use crate::errors::{ConfigError, PipelineError};
use crate::graph::{AdjacencyMetadata, Pipeline, StageIndex, StageNode};
use crate::observability::messages::engine::ExtractionStarted;
use crate::observability::messages::StructuredLog;
use crate::record::RecordCollection;
use crate::schema::SchemaDef;
use crate::stages::capture::{CaptureSink, CAPTURE_CLASS};
use crate::traits::{Params, StageKind};

/// What an extraction returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageDataType {
    Schema,
    Data,
}

impl StageDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageDataType::Schema => "schema",
            StageDataType::Data => "data",
        }
    }
}

impl Display for StageDataType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageData {
    Schema(Option<SchemaDef>),
    Records(RecordCollection),
}

impl StageData {
    /// JSON rendering: the schema object, or a GeoJSON FeatureCollection.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        match self {
            StageData::Schema(schema) => serde_json::to_value(schema),
            StageData::Records(collection) => Ok(collection.to_geojson()),
        }
    }
}

struct Snapshot {
    roots: Vec<StageIndex>,
    adjacency: Vec<AdjacencyMetadata>,
}

impl Snapshot {
    fn take(pipeline: &Pipeline) -> Self {
        Self {
            roots: pipeline.roots.clone(),
            adjacency: pipeline.nodes.iter().map(|n| n.adjacency.clone()).collect(),
        }
    }

    fn restore(self, pipeline: &mut Pipeline) {
        pipeline.nodes.truncate(self.adjacency.len());
        for (node, adjacency) in pipeline.nodes.iter_mut().zip(self.adjacency) {
            node.adjacency = adjacency;
        }
        pipeline.roots = self.roots;
    }
}

impl Pipeline {
    /// Schema or materialized output of one stage, without running the
    /// pipeline's own sinks.
    pub fn extract(
        &mut self,
        stage_id: &str,
        mode: StageDataType,
        context: &RunContext,
    ) -> Result<StageData, PipelineError> {
        let target = self
            .find(stage_id)
            .ok_or_else(|| ConfigError::StageNotFound(stage_id.to_string()))?;

        ExtractionStarted {
            stage_id,
            mode: mode.as_str(),
        }
        .log();

        let snapshot = Snapshot::take(self);
        let captured = Rc::new(RefCell::new(None));
        let capture = self.splice_capture(target, CaptureSink::new(mode, Rc::clone(&captured)));
        let capture_id = self.node(capture).id().to_string();

        let mut records = Vec::new();
        let result = self.run_with(context, |sink_id, record| {
            if sink_id == capture_id {
                records.push(record.clone());
            }
        });
        snapshot.restore(self);
        result?;

        let schema = captured.borrow_mut().take();
        Ok(match mode {
            StageDataType::Schema => StageData::Schema(schema),
            StageDataType::Data => StageData::Records(RecordCollection {
                srid: schema.map_or(0, |s| s.srid),
                records,
            }),
        })
    }

    pub fn schema_of_stage(
        &mut self,
        stage_id: &str,
        context: &RunContext,
    ) -> Result<Option<SchemaDef>, PipelineError> {
        match self.extract(stage_id, StageDataType::Schema, context)? {
            StageData::Schema(schema) => Ok(schema),
            StageData::Records(_) => Ok(None),
        }
    }

    pub fn data_of_stage(
        &mut self,
        stage_id: &str,
        context: &RunContext,
    ) -> Result<RecordCollection, PipelineError> {
        match self.extract(stage_id, StageDataType::Data, context)? {
            StageData::Records(collection) => Ok(collection),
            StageData::Schema(_) => Ok(RecordCollection::default()),
        }
    }

    fn splice_capture(&mut self, target: StageIndex, sink: CaptureSink) -> StageIndex {
        let parent = self.node(target).adjacency.parent;
        let capture = self.push(StageNode::new(
            format!("capture-{}", Uuid::new_v4()),
            CAPTURE_CLASS.to_string(),
            Box::new(sink),
            Params::new(),
            parent,
        ));

        if self.node(target).kind == StageKind::Sink {
            for input in self.node(target).adjacency.inputs.clone() {
                self.connect(input, capture);
            }
        } else {
            for output in std::mem::take(&mut self.node_mut(target).adjacency.outputs) {
                self.node_mut(output).adjacency.inputs.retain(|i| *i != target);
            }
            self.connect(target, capture);
        }

        let siblings = match parent {
            Some(parent) => &mut self.nodes[parent.0].adjacency.children,
            None => &mut self.roots,
        };
        let position = siblings
            .iter()
            .position(|i| *i == target)
            .map_or(siblings.len(), |p| p + 1);
        siblings.insert(position, capture);

        self.drop_sinks(capture);
        capture
    }

    /// Remove every sink but `keep` from the structure.
    fn drop_sinks(&mut self, keep: StageIndex) {
        let nodes = &self.nodes;
        let kept = |index: &StageIndex| *index == keep || nodes[index.0].kind != StageKind::Sink;

        let roots: Vec<StageIndex> = self.roots.iter().copied().filter(|i| kept(i)).collect();
        let children: Vec<Vec<StageIndex>> = nodes
            .iter()
            .map(|n| n.adjacency.children.iter().copied().filter(|i| kept(i)).collect())
            .collect();

        self.roots = roots;
        for (node, children) in self.nodes.iter_mut().zip(children) {
            node.adjacency.children = children;
        }
    }
}
