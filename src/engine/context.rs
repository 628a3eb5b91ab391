// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};

use crate::config::consts::TEMP_DIR_PREFIX;
use crate::config::EngineSettings;

/// Keyed run metadata any stage may extend.
#[derive(Debug, Default)]
pub struct ReportSink {
    entries: RefCell<BTreeMap<String, Value>>,
}

impl ReportSink {
    pub fn insert(&self, key: &str, value: impl Into<Value>) {
        self.entries.borrow_mut().insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(map)
    }
}

/// Per-execution resources shared by reference with every stage of one run.
///
/// Not thread-safe; one context serves one run at a time. The scratch
/// directory is created on first use and removed when the context drops.
#[derive(Debug, Default)]
pub struct RunContext {
    temp_path: Option<PathBuf>,
    temp_dir: RefCell<Option<TempDir>>,
    report: ReportSink,
    ui_mode: bool,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            temp_path: settings.temp_path.clone(),
            ui_mode: settings.ui_mode,
            ..Self::default()
        }
    }

    /// Create scratch directories under `path` instead of the system temp dir.
    pub fn with_temp_path(mut self, path: impl AsRef<Path>) -> Self {
        self.temp_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_ui_mode(mut self, ui_mode: bool) -> Self {
        self.ui_mode = ui_mode;
        self
    }

    /// Whether the run was requested by an interactive front end.
    pub fn ui_mode(&self) -> bool {
        self.ui_mode
    }

    pub fn report(&self) -> &ReportSink {
        &self.report
    }

    /// Scratch directory of this context, created on first call.
    pub fn temp_data_path(&self) -> Result<PathBuf, io::Error> {
        let mut slot = self.temp_dir.borrow_mut();
        if let Some(dir) = slot.as_ref() {
            return Ok(dir.path().to_path_buf());
        }

        let mut builder = Builder::new();
        builder.prefix(TEMP_DIR_PREFIX);
        let dir = match &self.temp_path {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        *slot = Some(dir);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_temp_data_path_is_created_once_under_parent() {
        let parent = tempfile::tempdir().unwrap();
        let context = RunContext::new().with_temp_path(parent.path());

        let first = context.temp_data_path().unwrap();
        let second = context.temp_data_path().unwrap();

        assert_eq!(first, second);
        assert!(first.is_dir());
        assert!(first.starts_with(parent.path()));
        let name = first.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(TEMP_DIR_PREFIX));

        drop(context);
        assert!(!first.exists());
    }

    #[test]
    fn test_report_sink_collects_entries() {
        let context = RunContext::new();
        assert!(context.report().is_empty());

        context.report().insert("status", "ok");
        context.report().insert("elapsedTime", 1.5);
        context.report().insert("status", "failed");

        assert_eq!(context.report().len(), 2);
        assert_eq!(context.report().get("status"), Some(json!("failed")));
        assert_eq!(context.report().to_json(), json!({"elapsedTime": 1.5, "status": "failed"}));
    }

    #[test]
    fn test_from_settings() {
        let settings = EngineSettings {
            temp_path: Some(PathBuf::from("/var/tmp/geoflow")),
            ui_mode: true,
            ..EngineSettings::default()
        };
        let context = RunContext::from_settings(&settings);
        assert!(context.ui_mode());
        assert_eq!(context.temp_path.as_deref(), Some(Path::new("/var/tmp/geoflow")));
    }
}
