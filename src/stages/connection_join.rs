// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::{json, Map, Value};
use std::cell::Cell;
use std::collections::BTreeMap;

use crate::config::consts::KEY_STAGES;
use crate::engine::RunScope;
use crate::errors::StageError;
use crate::record::{Record, RecordStream};
use crate::schema::SchemaDef;
use crate::traits::{stage_id_list, ParamMetadata, Params, Stage, StageKind};

/// Fan-in join: emits the records of every stage in `stages`, stage by stage.
///
/// When the joined schemas differ, each record is reshaped to the merged
/// field list; missing attributes take the field default.
#[derive(Default)]
pub struct ConnectionJoin {
    stages: Vec<String>,
    heterogeneous: Cell<bool>,
}

impl ConnectionJoin {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalize(record: Record, schema: &SchemaDef) -> Record {
    let mut properties = Map::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let value = record
            .properties
            .iter()
            .find(|(name, _)| field.same_name(name))
            .map(|(_, value)| value.clone())
            .or_else(|| field.default_value.clone())
            .unwrap_or(Value::Null);
        properties.insert(field.name.clone(), value);
    }
    Record { properties, ..record }
}

impl Stage for ConnectionJoin {
    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn alias(&self) -> &str {
        "Connection Join"
    }

    fn category(&self) -> &str {
        "Graph"
    }

    fn description(&self) -> &str {
        "Joins the outputs of several stages into one stream."
    }

    fn params(&self) -> BTreeMap<String, ParamMetadata> {
        BTreeMap::from([(
            KEY_STAGES.to_string(),
            ParamMetadata::new("Identifiers of the stages to join, in order.", "string[]")
                .with_default(json!([])),
        )])
    }

    fn is_join(&self) -> bool {
        true
    }

    fn configure(&mut self, params: &Params) -> Result<(), StageError> {
        self.stages = stage_id_list(params.get(KEY_STAGES));
        if self.stages.is_empty() {
            return Err(StageError::InvalidParameter {
                name: KEY_STAGES.to_string(),
                reason: "a join needs at least one stage".to_string(),
            });
        }
        Ok(())
    }

    fn starting_run(
        &self,
        input_schema: Option<SchemaDef>,
        scope: RunScope<'_>,
    ) -> Result<Option<SchemaDef>, StageError> {
        let field_count = input_schema.as_ref().map_or(0, |s| s.fields().len());
        let heterogeneous = scope
            .input_schemas()
            .iter()
            .any(|schema| schema.fields().len() != field_count);
        self.heterogeneous.set(heterogeneous);
        Ok(input_schema)
    }

    fn run<'s>(
        &'s self,
        input: RecordStream<'s>,
        scope: RunScope<'s>,
    ) -> Result<RecordStream<'s>, StageError> {
        if !self.heterogeneous.get() {
            return Ok(input);
        }
        let Some(schema) = scope.schema() else {
            return Ok(input);
        };
        Ok(Box::new(input.map(move |item| item.map(|record| normalize(record, &schema)))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, FieldDef, GeometryType};

    #[test]
    fn test_normalize_reorders_and_fills_defaults() {
        let schema = SchemaDef::new("joined", Some(GeometryType::Point), 4326)
            .with_fields([
                FieldDef::new("id", DataType::Integer),
                FieldDef::new("name", DataType::String).with_default(json!("unnamed")),
                FieldDef::new("area", DataType::Float),
            ])
            .unwrap();

        let mut properties = Map::new();
        properties.insert("AREA".to_string(), json!(2.5));
        properties.insert("id".to_string(), json!(7));
        let record = Record::new(properties, None).with_fid(3);

        let normalized = normalize(record, &schema);
        let names: Vec<&String> = normalized.properties.keys().collect();
        assert_eq!(names, vec!["id", "name", "area"]);
        assert_eq!(normalized.properties["name"], json!("unnamed"));
        assert_eq!(normalized.properties["area"], json!(2.5));
        assert_eq!(normalized.fid, Some(3));
    }

    #[test]
    fn test_configure_requires_stages() {
        let mut join = ConnectionJoin::new();
        assert!(join.configure(&Params::new()).is_err());

        let mut params = Params::new();
        params.insert(KEY_STAGES.to_string(), json!("a, b"));
        join.configure(&params).unwrap();
        assert_eq!(join.stages, vec!["a", "b"]);
    }
}
