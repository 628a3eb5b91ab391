// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::consts::KEY_CONNECTION_STRING;
use crate::engine::RunScope;
use crate::errors::StageError;
use crate::record::{Record, RecordCollection, RecordStream};
use crate::schema::SchemaDef;
use crate::traits::{bind_params, ParamMetadata, Params, Stage, StageKind, StoreCapability};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriterConfig {
    #[serde(default)]
    connection_string: Option<String>,
}

/// Writes the records it receives as one GeoJSON FeatureCollection file.
///
/// Records pass through unchanged; the file is written when the run
/// finishes.
#[derive(Default)]
pub struct GeoJsonWriter {
    config: WriterConfig,
    srid: Cell<i32>,
    written: RefCell<Vec<Record>>,
}

impl GeoJsonWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn target(&self) -> Result<&str, StageError> {
        self.config
            .connection_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| StageError::InvalidParameter {
                name: KEY_CONNECTION_STRING.to_string(),
                reason: "no output file given".to_string(),
            })
    }
}

impl Stage for GeoJsonWriter {
    fn kind(&self) -> StageKind {
        StageKind::Sink
    }

    fn alias(&self) -> &str {
        "GeoJSON Writer"
    }

    fn category(&self) -> &str {
        "Output"
    }

    fn description(&self) -> &str {
        "Writes features to a GeoJSON file."
    }

    fn params(&self) -> BTreeMap<String, ParamMetadata> {
        BTreeMap::from([(
            KEY_CONNECTION_STRING.to_string(),
            ParamMetadata::new("Output GeoJSON file path.", "string").with_default(Value::Null),
        )])
    }

    fn test_capability(&self, connection: &Value, capability: StoreCapability) -> bool {
        if capability == StoreCapability::Read {
            return false;
        }
        connection.as_str().is_some_and(|path| {
            let lowered = path.to_lowercase();
            lowered.ends_with(".geojson") || lowered.ends_with(".json")
        })
    }

    fn configure(&mut self, params: &Params) -> Result<(), StageError> {
        self.config = bind_params(params)?;
        Ok(())
    }

    fn starting_run(
        &self,
        input_schema: Option<SchemaDef>,
        _scope: RunScope<'_>,
    ) -> Result<Option<SchemaDef>, StageError> {
        self.target()?;
        self.srid.set(input_schema.as_ref().map_or(0, |s| s.srid));
        self.written.borrow_mut().clear();
        Ok(input_schema)
    }

    fn run<'s>(
        &'s self,
        input: RecordStream<'s>,
        _scope: RunScope<'s>,
    ) -> Result<RecordStream<'s>, StageError> {
        Ok(Box::new(input.inspect(move |item| {
            if let Ok(record) = item {
                self.written.borrow_mut().push(record.clone());
            }
        })))
    }

    fn finished_run(&self, _scope: RunScope<'_>) -> Result<bool, StageError> {
        let collection = RecordCollection {
            srid: self.srid.get(),
            records: self.written.take(),
        };

        let path = Path::new(self.target()?);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&collection.to_geojson())?)?;
        Ok(true)
    }

    fn clean(&self) {
        self.written.borrow_mut().clear();
    }
}
