// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The capability contract every pipeline stage implements.
//!
//! A stage is one configured node of the pipeline graph. The engine drives it
//! through three hooks per run:
//!
//! 1. [`Stage::starting_run`] receives the (possibly merged) input schema and
//!    returns the output schema. Called exactly once per run.
//! 2. [`Stage::run`] wraps a lazily-pulled input stream. Called once per
//!    downstream consumer, so it must be re-invocable.
//! 3. [`Stage::finished_run`] is called exactly once per run, when the last
//!    consumer is done.
//!
//! [`Stage::clean`] is a best-effort teardown called at the end of every run.
//!
//! # Examples
//!
//! ```
//! use the_geoflow::traits::{Stage, StageKind};
//!
//! struct Passthrough;
//!
//! impl Stage for Passthrough {
//!     fn kind(&self) -> StageKind {
//!         StageKind::Transform
//!     }
//!     fn alias(&self) -> &str {
//!         "Passthrough"
//!     }
//!     fn description(&self) -> &str {
//!         "Emits its input unchanged."
//!     }
//! }
//!
//! assert_eq!(Passthrough.category(), "Modules");
//! ```

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::engine::RunScope;
use crate::errors::StageError;
use crate::record::RecordStream;
use crate::schema::SchemaDef;

/// Open parameter bag bound from the stage descriptor and overrides.
pub type Params = Map<String, Value>;

/// Capability kind of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Reads records from a data store; never receives implicit input edges.
    Source,
    Transform,
    /// Writes records; a sink without outputs drives a run.
    Sink,
}

/// Data store capability probed by [`Stage::test_capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCapability {
    Read,
    Write,
    Create,
}

/// Declared metadata of one stage parameter, published in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamMetadata {
    pub description: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<Value>>,
}

impl ParamMetadata {
    pub fn new(description: &str, data_type: &str) -> Self {
        Self {
            description: description.to_string(),
            data_type: data_type.to_string(),
            default: None,
            options: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_options(mut self, options: Vec<Value>) -> Self {
        self.options = Some(options);
        self
    }
}

pub trait Stage {
    fn kind(&self) -> StageKind;

    /// Human alias-name of the stage.
    fn alias(&self) -> &str;

    fn category(&self) -> &str {
        "Modules"
    }

    fn description(&self) -> &str;

    fn params(&self) -> BTreeMap<String, ParamMetadata> {
        BTreeMap::new()
    }

    /// Whether this stage can open `connection` with the given capability.
    /// Only meaningful for sources and sinks.
    fn test_capability(&self, _connection: &Value, _capability: StoreCapability) -> bool {
        false
    }

    /// Fan-in joins read the concatenation of their `stages` list instead of
    /// a single upstream producer.
    fn is_join(&self) -> bool {
        false
    }

    /// Bind the parameter bag to the stage's typed configuration.
    ///
    /// Called once the graph is assembled and again whenever the engine
    /// rebinds a parameter for the duration of a run.
    fn configure(&mut self, _params: &Params) -> Result<(), StageError> {
        Ok(())
    }

    fn starting_run(
        &self,
        input_schema: Option<SchemaDef>,
        _scope: RunScope<'_>,
    ) -> Result<Option<SchemaDef>, StageError> {
        Ok(input_schema)
    }

    fn run<'s>(
        &'s self,
        input: RecordStream<'s>,
        _scope: RunScope<'s>,
    ) -> Result<RecordStream<'s>, StageError> {
        Ok(input)
    }

    fn finished_run(&self, _scope: RunScope<'_>) -> Result<bool, StageError> {
        Ok(true)
    }

    fn clean(&self) {}
}

/// Deserialize the parameter bag into a typed configuration struct.
///
/// Keys the struct does not declare are ignored; they stay available in the
/// bag for forward-compatible stages.
pub fn bind_params<T: DeserializeOwned>(params: &Params) -> Result<T, StageError> {
    serde_json::from_value(Value::Object(params.clone())).map_err(|e| StageError::InvalidParameter {
        name: "params".to_string(),
        reason: e.to_string(),
    })
}

/// Read a `stages`-style parameter: either a list of ids or a comma-separated string.
pub fn stage_id_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_stage_id_list_forms() {
        struct TestCase {
            value: Option<Value>,
            expected: Vec<&'static str>,
        }

        let cases = vec![
            TestCase { value: Some(json!(["a", "b"])), expected: vec!["a", "b"] },
            TestCase { value: Some(json!("a, b,,c")), expected: vec!["a", "b", "c"] },
            TestCase { value: Some(json!([1, "x"])), expected: vec!["1", "x"] },
            TestCase { value: Some(json!(null)), expected: vec![] },
            TestCase { value: None, expected: vec![] },
        ];

        for case in cases {
            assert_eq!(stage_id_list(case.value.as_ref()), case.expected);
        }
    }

    #[test]
    fn test_bind_params_reports_type_errors() {
        #[derive(Deserialize)]
        #[allow(dead_code)]
        struct Config {
            count: i64,
        }

        let mut params = Params::new();
        params.insert("count".to_string(), json!("many"));
        params.insert("other".to_string(), json!(true));

        assert!(matches!(
            bind_params::<Config>(&params),
            Err(StageError::InvalidParameter { .. })
        ));

        params.insert("count".to_string(), json!(3));
        assert!(bind_params::<Config>(&params).is_ok());
    }

    #[test]
    fn test_param_metadata_serializes_camel_case() {
        let meta = ParamMetadata::new("Maximum count", "int").with_default(json!(0));
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["dataType"], json!("int"));
        assert_eq!(value["default"], json!(0));
        assert!(value.get("options").is_none());
    }
}
