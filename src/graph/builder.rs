// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph assembly from a nested stage descriptor list.
//!
//! Assembly runs in four passes:
//!
//! 1. **Parse** every descriptor into a node, recursing into `pipeline` lists.
//! 2. **Override** each sibling list: `-source`/`-target` insert capability
//!    matched stages (top level only), `--module.<id>.<attr>` rebinds a
//!    parameter, coerced to the attribute's current type.
//! 3. **Substitute** `${KEY}`/`%KEY%` tokens in connection strings of the
//!    list's sources and sinks.
//! 4. **Wire** data-flow edges (`build_tree`): explicit references first, then
//!    implicit chaining of structural siblings.
//!
//! Finally every stage binds its parameter bag through [`Stage::configure`].
//!
//! [`Stage::configure`]: crate::traits::Stage::configure

use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use super::environment::{coerce_override, environment, replace_tokens};
use super::{Pipeline, StageIndex, StageNode};
use crate::config::consts::{
    KEY_CONNECTION_STRING, KEY_INPUT_STAGE_ID, KEY_MODULE_LOCATION, KEY_OUTPUT_STAGE_ID,
    KEY_PIPELINE, KEY_STAGES, KEY_STAGE_ID, KEY_TYPE,
};
use crate::config::{is_source_flag, is_target_flag, value_as_text, PipelineArgs};
use crate::errors::{ConfigError, PipelineError, StageError};
use crate::observability::messages::graph::{
    CapabilityStageInserted, DanglingStageReference, GraphBuilt, OverrideApplied,
};
use crate::observability::messages::StructuredLog;
use crate::registry::ModuleRegistry;
use crate::traits::{stage_id_list, Params, Stage, StageKind, StoreCapability};

pub struct GraphBuilder<'r> {
    registry: &'r ModuleRegistry,
    pipeline: Pipeline,
}

impl<'r> GraphBuilder<'r> {
    pub fn new(registry: &'r ModuleRegistry) -> Self {
        Self {
            registry,
            pipeline: Pipeline {
                nodes: Vec::new(),
                roots: Vec::new(),
            },
        }
    }

    pub fn build(mut self, descriptors: &[Value], args: &PipelineArgs) -> Result<Pipeline, PipelineError> {
        let roots = self.parse_list(descriptors, args, None)?;
        let mut pipeline = self.pipeline;
        pipeline.roots = roots;

        build_tree(&mut pipeline);

        for index in pipeline.flatten() {
            pipeline.configure(index)?;
        }

        GraphBuilt {
            stage_count: pipeline.len(),
            root_count: pipeline.roots.len(),
            edge_count: pipeline.edge_count(),
        }
        .log();
        Ok(pipeline)
    }

    fn parse_list(
        &mut self,
        descriptors: &[Value],
        args: &PipelineArgs,
        parent: Option<StageIndex>,
    ) -> Result<Vec<StageIndex>, PipelineError> {
        let child_args = args.children_scope();
        let mut siblings = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            siblings.push(self.parse_descriptor(descriptor, &child_args, parent)?);
        }

        self.apply_overrides(&mut siblings, args, parent)?;
        self.substitute_tokens(&siblings, args);
        Ok(siblings)
    }

    fn parse_descriptor(
        &mut self,
        descriptor: &Value,
        args: &PipelineArgs,
        parent: Option<StageIndex>,
    ) -> Result<StageIndex, PipelineError> {
        let settings = descriptor.as_object().ok_or_else(|| {
            ConfigError::InvalidDescriptor(format!("expected an object, found {}", descriptor))
        })?;
        let type_name = settings
            .get(KEY_TYPE)
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::InvalidDescriptor(format!("missing \"type\" in {}", descriptor)))?;
        let location = settings.get(KEY_MODULE_LOCATION).and_then(Value::as_str);

        let factory = self.registry.resolve(type_name, location)?;
        let stage = factory.create();
        let class_name = factory.class_name().to_string();

        let mut params = declared_defaults(stage.as_ref());
        for (key, value) in settings {
            if key != KEY_TYPE && key != KEY_PIPELINE && key != KEY_STAGE_ID {
                params.insert(key.clone(), value.clone());
            }
        }

        let id = match settings.get(KEY_STAGE_ID) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let index = self.pipeline.push(StageNode::new(id, class_name, stage, params, parent));

        if let Some(children) = settings.get(KEY_PIPELINE) {
            let children = children.as_array().ok_or_else(|| {
                ConfigError::InvalidDescriptor(format!("\"pipeline\" of \"{}\" must be an array", type_name))
            })?;
            let children = self.parse_list(children, args, Some(index))?;
            self.pipeline.node_mut(index).adjacency.children = children;
        }
        Ok(index)
    }

    fn apply_overrides(
        &mut self,
        siblings: &mut Vec<StageIndex>,
        args: &PipelineArgs,
        parent: Option<StageIndex>,
    ) -> Result<(), PipelineError> {
        for (key, value) in args.iter() {
            if is_source_flag(key) {
                let index = self
                    .insert_capability_stage(value, StageKind::Source, StoreCapability::Read, parent)
                    .ok_or_else(|| ConfigError::UnsupportedInput(value_as_text(value)))?;
                siblings.insert(0, index);
                self.log_inserted(index, value, 0);
            } else if is_target_flag(key) {
                let index = self
                    .insert_capability_stage(value, StageKind::Sink, StoreCapability::Create, parent)
                    .ok_or_else(|| ConfigError::UnsupportedOutput(value_as_text(value)))?;
                siblings.push(index);
                self.log_inserted(index, value, siblings.len() - 1);
            } else if let Some((stage_id, attribute)) = PipelineArgs::module_override(key) {
                for &index in siblings.iter() {
                    let node = self.pipeline.node_mut(index);
                    if node.id != stage_id {
                        continue;
                    }

                    let coerced = coerce_override(node.params.get(attribute), value).map_err(|reason| {
                        ConfigError::InvalidOverride {
                            stage_id: stage_id.to_string(),
                            attribute: attribute.to_string(),
                            value: value_as_text(value),
                            reason,
                        }
                    })?;
                    OverrideApplied {
                        stage_id,
                        attribute,
                        value: &coerced,
                    }
                    .log();
                    node.params.insert(attribute.to_string(), coerced);
                }
            }
        }
        Ok(())
    }

    fn insert_capability_stage(
        &mut self,
        data_source: &Value,
        kind: StageKind,
        capability: StoreCapability,
        parent: Option<StageIndex>,
    ) -> Option<StageIndex> {
        let (class_name, stage) = self.registry.find_by_data_source(data_source, kind, capability)?;

        let mut params = declared_defaults(stage.as_ref());
        params.insert(KEY_CONNECTION_STRING.to_string(), data_source.clone());

        let id = Uuid::new_v4().to_string();
        Some(self.pipeline.push(StageNode::new(id, class_name, stage, params, parent)))
    }

    fn log_inserted(&self, index: StageIndex, data_source: &Value, position: usize) {
        let node = self.pipeline.node(index);
        CapabilityStageInserted {
            stage_id: &node.id,
            class_name: &node.class_name,
            data_source: &value_as_text(data_source),
            position,
        }
        .log();
    }

    fn substitute_tokens(&mut self, siblings: &[StageIndex], args: &PipelineArgs) {
        let first_source = siblings
            .iter()
            .map(|index| self.pipeline.node(*index))
            .find(|node| node.kind == StageKind::Source)
            .and_then(|node| node.params.get(KEY_CONNECTION_STRING))
            .cloned();

        let environment = environment(first_source.as_ref(), args);
        if environment.is_empty() {
            return;
        }

        for &index in siblings {
            let node = self.pipeline.node_mut(index);
            if !matches!(node.kind, StageKind::Source | StageKind::Sink) {
                continue;
            }
            if let Some(connection) = node.params.get_mut(KEY_CONNECTION_STRING) {
                replace_tokens(connection, &environment);
            }
        }
    }
}

/// Non-null declared parameter defaults, the initial bag of a new stage.
fn declared_defaults(stage: &dyn Stage) -> Params {
    stage
        .params()
        .into_iter()
        .filter_map(|(name, meta)| match meta.default {
            Some(Value::Null) | None => None,
            Some(value) => Some((name, value)),
        })
        .collect()
}

pub(crate) fn configure_error(stage_id: &str, error: StageError) -> PipelineError {
    match error {
        StageError::InvalidParameter { name, reason } => ConfigError::InvalidParameter {
            stage_id: stage_id.to_string(),
            name,
            reason,
        }
        .into(),
        other => PipelineError::stage_failed(stage_id, "configure", other),
    }
}

fn reference(node: &StageNode, key: &str) -> Option<String> {
    match node.params.get(key)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Resolve data-flow edges over the whole forest.
///
/// Top-level siblings are chained by the synthetic root, which itself never
/// produces an edge.
pub(crate) fn build_tree(pipeline: &mut Pipeline) {
    let ids = pipeline.id_index();
    let mut previous: Option<StageIndex> = None;

    for root in pipeline.roots.clone() {
        let terminal = wire(pipeline, &ids, root);
        if let Some(previous) = previous {
            chain(pipeline, previous, terminal);
        }
        previous = Some(terminal);
    }
}

/// Wire one node and its structural children; returns the node whose output
/// the next sibling chains from.
fn wire(pipeline: &mut Pipeline, ids: &HashMap<String, StageIndex>, index: StageIndex) -> StageIndex {
    let node = pipeline.node(index);
    let input_ref = reference(node, KEY_INPUT_STAGE_ID);
    let output_ref = reference(node, KEY_OUTPUT_STAGE_ID);
    let join_refs = node
        .stage
        .is_join()
        .then(|| stage_id_list(node.params.get(KEY_STAGES)));

    if let Some(target) = input_ref {
        if let Some(from) = lookup(pipeline, ids, index, &target, KEY_INPUT_STAGE_ID) {
            pipeline.connect(from, index);
        }
    }
    if let Some(target) = output_ref {
        if let Some(to) = lookup(pipeline, ids, index, &target, KEY_OUTPUT_STAGE_ID) {
            pipeline.connect(index, to);
        }
    }

    if let Some(stage_ids) = join_refs {
        for target in stage_ids {
            if let Some(from) = lookup(pipeline, ids, index, &target, KEY_STAGES) {
                pipeline.connect(from, index);
            }
        }
        return index;
    }

    let mut previous = index;
    for child in pipeline.node(index).adjacency.children.clone() {
        let terminal = wire(pipeline, ids, child);
        chain(pipeline, previous, terminal);
        previous = terminal;
    }
    previous
}

/// Implicit edge between consecutive terminals, unless `to` is a source or
/// already has an explicit input.
fn chain(pipeline: &mut Pipeline, from: StageIndex, to: StageIndex) {
    let target = pipeline.node(to);
    if target.kind == StageKind::Source || !target.adjacency.inputs.is_empty() {
        return;
    }
    pipeline.connect(from, to);
}

fn lookup(
    pipeline: &Pipeline,
    ids: &HashMap<String, StageIndex>,
    index: StageIndex,
    target: &str,
    edge: &str,
) -> Option<StageIndex> {
    let found = ids.get(target).copied();
    if found.is_none() {
        DanglingStageReference {
            stage_id: &pipeline.node(index).id,
            reference: target,
            edge,
        }
        .log();
    }
    found
}
