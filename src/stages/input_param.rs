// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::json;
use std::collections::BTreeMap;

use crate::config::consts::KEY_STAGES;
use crate::engine::RunScope;
use crate::errors::StageError;
use crate::record::RecordStream;
use crate::schema::SchemaDef;
use crate::traits::{stage_id_list, ParamMetadata, Params, Stage, StageKind};

/// Emits the output of the stages named in `stages`, pulled through the
/// side channel at run time. Without `stages` the input passes through.
#[derive(Default)]
pub struct InputParam {
    stages: Vec<String>,
}

impl InputParam {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for InputParam {
    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn alias(&self) -> &str {
        "Input Parameter"
    }

    fn category(&self) -> &str {
        "Graph"
    }

    fn description(&self) -> &str {
        "Reads the features of other stages of the pipeline by identifier."
    }

    fn params(&self) -> BTreeMap<String, ParamMetadata> {
        BTreeMap::from([(
            KEY_STAGES.to_string(),
            ParamMetadata::new("Identifiers of the stages to read.", "string[]")
                .with_default(json!([])),
        )])
    }

    fn configure(&mut self, params: &Params) -> Result<(), StageError> {
        self.stages = stage_id_list(params.get(KEY_STAGES));
        Ok(())
    }

    fn starting_run(
        &self,
        input_schema: Option<SchemaDef>,
        scope: RunScope<'_>,
    ) -> Result<Option<SchemaDef>, StageError> {
        if self.stages.is_empty() {
            return Ok(input_schema);
        }
        Ok(scope.schema_of(&self.stages)?)
    }

    fn run<'s>(
        &'s self,
        input: RecordStream<'s>,
        scope: RunScope<'s>,
    ) -> Result<RecordStream<'s>, StageError> {
        if self.stages.is_empty() {
            return Ok(input);
        }
        Ok(scope.enumerate_inputs(&self.stages)?)
    }
}
