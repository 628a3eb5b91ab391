// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

use super::context::RunContext;
use super::executor::Executor;
use crate::config::consts::{BASE64_MARKER, KEY_CONNECTION_STRING};
use crate::errors::{ConfigError, PipelineError};
use crate::graph::{Pipeline, StageIndex};
use crate::observability::messages::engine::{
    EmbeddedFileDecoded, NoSinkStages, RunCompleted, RunFailed, RunStarted,
};
use crate::observability::messages::StructuredLog;
use crate::record::Record;
use crate::traits::StageKind;

impl Pipeline {
    /// Run every terminal sink to completion. Returns the number of records
    /// drained from the sinks.
    pub fn run(&mut self, context: &RunContext) -> Result<usize, PipelineError> {
        self.run_with(context, |_, _| {})
    }

    /// Like [`Pipeline::run`], calling `callback(sink_id, record)` for every
    /// record drained from a sink.
    pub fn run_with<F>(&mut self, context: &RunContext, mut callback: F) -> Result<usize, PipelineError>
    where
        F: FnMut(&str, &Record),
    {
        let bindings = self.bind_embedded_files(context)?;
        let result = self.execute(context, &mut callback);
        let restored = self.restore_bindings(bindings);

        let count = result?;
        restored?;
        Ok(count)
    }

    fn execute(
        &self,
        context: &RunContext,
        callback: &mut dyn FnMut(&str, &Record),
    ) -> Result<usize, PipelineError> {
        let sinks = self.sinks();
        if sinks.is_empty() {
            NoSinkStages {
                stage_count: self.len(),
            }
            .log();
            return Ok(0);
        }

        let started = RunStarted {
            stage_count: self.len(),
            sink_count: sinks.len(),
        };
        started.log();
        let _span = started.span("pipeline_run").entered();
        let clock = Instant::now();

        let executor = Executor::new(self, context);
        let result = executor.execute(&sinks, callback);

        match &result {
            Ok(record_count) => RunCompleted {
                sink_count: sinks.len(),
                record_count: *record_count,
                duration: clock.elapsed(),
            }
            .log(),
            Err(error) => RunFailed { error }.log(),
        }
        result
    }

    /// Decode `{ name, fileData }` connection strings of sources into the
    /// context's temp directory and rebind those sources to the files.
    fn bind_embedded_files(
        &mut self,
        context: &RunContext,
    ) -> Result<Vec<(StageIndex, Value)>, PipelineError> {
        let mut bindings = Vec::new();

        for index in self.flatten() {
            let node = self.node(index);
            if node.kind() != StageKind::Source {
                continue;
            }
            let Some(original) = node.param(KEY_CONNECTION_STRING) else {
                continue;
            };
            let Some((name, payload)) = embedded_file(original) else {
                continue;
            };

            let decoded = STANDARD.decode(payload.trim()).map_err(|e| ConfigError::InvalidParameter {
                stage_id: node.id().to_string(),
                name: KEY_CONNECTION_STRING.to_string(),
                reason: format!("invalid embedded file data: {}", e),
            });
            let written = decoded.map_err(PipelineError::from).and_then(|bytes| {
                let path = context.temp_data_path()?.join(format!("{}_{}", Uuid::new_v4(), name));
                fs::write(&path, &bytes)?;
                EmbeddedFileDecoded {
                    stage_id: node.id(),
                    path: &path,
                    byte_count: bytes.len(),
                }
                .log();
                Ok(path)
            });
            let path = match written {
                Ok(path) => path,
                Err(error) => {
                    let _ = self.restore_bindings(bindings);
                    return Err(error);
                }
            };

            let original = original.clone();
            self.node_mut(index).params.insert(
                KEY_CONNECTION_STRING.to_string(),
                Value::String(path.to_string_lossy().replace('\\', "/")),
            );
            bindings.push((index, original));

            if let Err(error) = self.configure(index) {
                let _ = self.restore_bindings(bindings);
                return Err(error);
            }
        }
        Ok(bindings)
    }

    fn restore_bindings(&mut self, bindings: Vec<(StageIndex, Value)>) -> Result<(), PipelineError> {
        let mut result = Ok(());
        for (index, original) in bindings {
            self.node_mut(index)
                .params
                .insert(KEY_CONNECTION_STRING.to_string(), original);
            let configured = self.configure(index);
            if result.is_ok() {
                result = configured;
            }
        }
        result
    }
}

/// `(file name, base64 payload)` of an embedded file connection string.
fn embedded_file(connection: &Value) -> Option<(String, &str)> {
    let name = connection.get("name")?.as_str()?;
    let data = connection.get("fileData")?.as_str()?;
    let (_, payload) = data.split_once(BASE64_MARKER)?;

    let name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("data");
    Some((name.to_string(), payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedded_file_forms() {
        let connection = json!({
            "name": "../up/load.geojson",
            "fileData": "data:application/geo+json;base64,eyJ9",
        });
        let (name, payload) = embedded_file(&connection).unwrap();
        assert_eq!(name, "load.geojson");
        assert_eq!(payload, "eyJ9");

        assert!(embedded_file(&json!({"name": "a.geojson", "fileData": "plain"})).is_none());
        assert!(embedded_file(&json!("/data/a.geojson")).is_none());
        assert!(embedded_file(&json!({"fileData": ";base64,eyJ9"})).is_none());
    }
}
