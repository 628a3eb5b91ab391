// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The pipeline graph: a rooted forest of stage nodes with resolved edges.
//!
//! Nodes live in an arena owned by [`Pipeline`] and refer to each other by
//! [`StageIndex`]. Two relations coexist:
//!
//! * structure: `parent`/`children`, as nested in the descriptor document
//! * data flow: `inputs`/`outputs`, an edge A -> B meaning B consumes A's output
//!
//! Structure is fixed at parse time; data-flow edges are resolved by the
//! builder's tree wiring pass.

mod builder;
pub mod environment;

pub use builder::GraphBuilder;

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::config::consts::KEY_PIPELINE;
use crate::config::PipelineArgs;
use crate::errors::{ConfigError, PipelineError};
use crate::registry::ModuleRegistry;
use crate::traits::{Params, Stage, StageKind};

/// Position of a node in its pipeline's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageIndex(pub(crate) usize);

/// Structural and data-flow adjacency of one node.
///
/// `inputs` and `outputs` keep insertion order and never hold duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjacencyMetadata {
    pub parent: Option<StageIndex>,
    pub children: Vec<StageIndex>,
    pub inputs: Vec<StageIndex>,
    pub outputs: Vec<StageIndex>,
}

/// One configured stage instance of a pipeline.
pub struct StageNode {
    pub(crate) id: String,
    pub(crate) class_name: String,
    pub(crate) kind: StageKind,
    pub(crate) params: Params,
    pub(crate) stage: Box<dyn Stage>,
    pub(crate) adjacency: AdjacencyMetadata,
}

impl StageNode {
    pub(crate) fn new(
        id: String,
        class_name: String,
        stage: Box<dyn Stage>,
        params: Params,
        parent: Option<StageIndex>,
    ) -> Self {
        Self {
            id,
            class_name,
            kind: stage.kind(),
            params,
            stage,
            adjacency: AdjacencyMetadata {
                parent,
                ..AdjacencyMetadata::default()
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn stage(&self) -> &dyn Stage {
        self.stage.as_ref()
    }

    pub fn adjacency(&self) -> &AdjacencyMetadata {
        &self.adjacency
    }

    /// A sink without resolved outputs drives a run.
    pub fn is_terminal_sink(&self) -> bool {
        self.kind == StageKind::Sink && self.adjacency.outputs.is_empty()
    }
}

impl std::fmt::Debug for StageNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageNode")
            .field("id", &self.id)
            .field("class_name", &self.class_name)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("adjacency", &self.adjacency)
            .finish()
    }
}

/// A rooted forest of stages, ready to run.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use the_geoflow::config::PipelineArgs;
/// use the_geoflow::graph::Pipeline;
/// use the_geoflow::registry::ModuleRegistry;
///
/// let registry = ModuleRegistry::with_builtins();
/// let document = json!([
///     { "type": "GeoJsonReader", "stageId": "reader", "connectionString": "/data/roads.geojson" },
///     { "type": "FeatureLimit", "stageId": "limit", "countLimit": 100 },
/// ]);
///
/// let pipeline = Pipeline::load_from_json(&registry, &document, &PipelineArgs::new()).unwrap();
/// let reader = pipeline.find("reader").unwrap();
/// let limit = pipeline.find("limit").unwrap();
/// assert_eq!(pipeline.node(limit).adjacency().inputs, vec![reader]);
/// ```
#[derive(Debug)]
pub struct Pipeline {
    pub(crate) nodes: Vec<StageNode>,
    pub(crate) roots: Vec<StageIndex>,
}

impl Pipeline {
    /// Build a pipeline from a descriptor array or a `{ "pipeline": [...] }` document.
    pub fn load_from_json(
        registry: &ModuleRegistry,
        document: &Value,
        args: &PipelineArgs,
    ) -> Result<Pipeline, PipelineError> {
        let descriptors = match document {
            Value::Array(items) => items,
            Value::Object(map) => map
                .get(KEY_PIPELINE)
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    ConfigError::InvalidDescriptor("document has no \"pipeline\" array".to_string())
                })?,
            other => {
                return Err(ConfigError::InvalidDescriptor(format!(
                    "expected a stage array, found {}",
                    other
                ))
                .into())
            }
        };
        GraphBuilder::new(registry).build(descriptors, args)
    }

    /// Build a pipeline from a JSON file holding `{ "pipeline": [...] }`.
    ///
    /// `$KEY` tokens of plain overrides and `$PIPELINE_FOLDER`,
    /// `$PIPELINE_FILE`, `$PIPELINE_PATH` are replaced in the file text first.
    pub fn load_from_file<P: AsRef<Path>>(
        registry: &ModuleRegistry,
        path: P,
        args: &PipelineArgs,
    ) -> Result<Pipeline, PipelineError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let text = environment::substitute_document(&text, path, args);
        let document: Value = serde_json::from_str(&text)?;

        match document.get(KEY_PIPELINE) {
            Some(Value::Array(_)) => Self::load_from_json(registry, &document, args),
            _ => Err(ConfigError::InvalidDescriptor(format!(
                "{} has no \"pipeline\" array",
                path.display()
            ))
            .into()),
        }
    }

    /// Top-level sibling list.
    pub fn roots(&self) -> &[StageIndex] {
        &self.roots
    }

    pub fn node(&self, index: StageIndex) -> &StageNode {
        &self.nodes[index.0]
    }

    pub(crate) fn node_mut(&mut self, index: StageIndex) -> &mut StageNode {
        &mut self.nodes[index.0]
    }

    /// Every stage reachable from the roots, in structural pre-order.
    pub fn flatten(&self) -> Vec<StageIndex> {
        fn visit(pipeline: &Pipeline, index: StageIndex, out: &mut Vec<StageIndex>) {
            out.push(index);
            for &child in &pipeline.node(index).adjacency.children {
                visit(pipeline, child, out);
            }
        }

        let mut out = Vec::new();
        for &root in &self.roots {
            visit(self, root, &mut out);
        }
        out
    }

    pub fn stages(&self) -> impl Iterator<Item = &StageNode> + '_ {
        self.flatten().into_iter().map(move |index| self.node(index))
    }

    pub fn len(&self) -> usize {
        self.flatten().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Resolve a stage identifier against the whole forest. When identifiers
    /// repeat, the last one in pre-order wins.
    pub fn find(&self, stage_id: &str) -> Option<StageIndex> {
        self.flatten()
            .into_iter()
            .rev()
            .find(|index| self.node(*index).id == stage_id)
    }

    pub(crate) fn id_index(&self) -> HashMap<String, StageIndex> {
        self.flatten()
            .into_iter()
            .map(|index| (self.node(index).id.clone(), index))
            .collect()
    }

    /// Terminal sinks in declaration order.
    pub fn sinks(&self) -> Vec<StageIndex> {
        self.flatten()
            .into_iter()
            .filter(|index| self.node(*index).is_terminal_sink())
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.stages().map(|node| node.adjacency.outputs.len()).sum()
    }

    /// Add the edge `from -> to`; B consumes A's output.
    pub(crate) fn connect(&mut self, from: StageIndex, to: StageIndex) {
        let outputs = &mut self.nodes[from.0].adjacency.outputs;
        if !outputs.contains(&to) {
            outputs.push(to);
        }
        let inputs = &mut self.nodes[to.0].adjacency.inputs;
        if !inputs.contains(&from) {
            inputs.push(from);
        }
    }

    pub(crate) fn push(&mut self, node: StageNode) -> StageIndex {
        self.nodes.push(node);
        StageIndex(self.nodes.len() - 1)
    }

    /// Rebind a node's parameters to its stage.
    pub(crate) fn configure(&mut self, index: StageIndex) -> Result<(), PipelineError> {
        let node = &mut self.nodes[index.0];
        node.stage
            .configure(&node.params)
            .map_err(|error| builder::configure_error(&node.id, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::consts::KEY_CONNECTION_STRING;
    use crate::stages::testing::test_registry;
    use serde_json::json;

    #[test]
    fn test_load_from_file_substitutes_document_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("roads.json");
        fs::write(
            &file,
            r#"{ "pipeline": [
                { "type": "GeoJsonReader", "stageId": "r", "connectionString": "$PIPELINE_FOLDER/roads.geojson" },
                { "type": "FeatureLimit", "stageId": "limit", "countLimit": $LIMIT }
            ] }"#,
        )
        .unwrap();

        let args = PipelineArgs::from_tokens(["LIMIT=2"]);
        let pipeline = Pipeline::load_from_file(&test_registry(), &file, &args).unwrap();

        let reader = pipeline.node(pipeline.find("r").unwrap());
        let expected = format!("{}/roads.geojson", dir.path().to_string_lossy().replace('\\', "/"));
        assert_eq!(reader.param(KEY_CONNECTION_STRING), Some(&json!(expected)));

        let limit = pipeline.node(pipeline.find("limit").unwrap());
        assert_eq!(limit.param("countLimit"), Some(&json!(2)));
        assert_eq!(pipeline.edge_count(), 1);
    }

    #[test]
    fn test_load_from_file_requires_pipeline_array() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.json");
        fs::write(&file, r#"{ "stages": [] }"#).unwrap();

        let result = Pipeline::load_from_file(&test_registry(), &file, &PipelineArgs::new());
        assert!(matches!(
            result,
            Err(PipelineError::Config(ConfigError::InvalidDescriptor(_)))
        ));
    }

    #[test]
    fn test_load_from_json_accepts_wrapped_document() {
        let document = json!({ "pipeline": [
            { "type": "GeoJsonReader", "stageId": "r", "connectionString": "/data/a.geojson" },
            { "type": "GeoJsonWriter", "stageId": "w", "connectionString": "/out/a.geojson" },
        ] });

        let pipeline = Pipeline::load_from_json(&test_registry(), &document, &PipelineArgs::new()).unwrap();

        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.sinks(), vec![pipeline.find("w").unwrap()]);
        assert!(Pipeline::load_from_json(&test_registry(), &json!("x"), &PipelineArgs::new()).is_err());
    }
}
