// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline override parameters.
//!
//! Overrides arrive either as a flat command-line style token list or as an
//! already-built name/value map. Both normalize into [`PipelineArgs`], an
//! insertion-ordered map, because override application order matters.
//!
//! # Examples
//!
//! ```
//! use the_geoflow::config::PipelineArgs;
//!
//! let args = PipelineArgs::from_tokens([
//!     "-source", "/data/roads.geojson",
//!     "--module.limit.countLimit", "5",
//!     "region=north",
//! ]);
//!
//! assert_eq!(args.len(), 3);
//! assert_eq!(args.get("region").and_then(|v| v.as_str()), Some("north"));
//! ```

use serde_json::{Map, Value};

use crate::config::consts::{
    MODULE_OVERRIDE_SCOPE, PIPELINE_ENV_SCOPE, SOURCE_FLAGS, TARGET_FLAGS,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineArgs {
    entries: Map<String, Value>,
}

impl PipelineArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a flat token list.
    ///
    /// `-source/-i/-input`, `-target/-o/-output` and any `--x` token without
    /// `=` take the next token as value. Other tokens split on the first `=`;
    /// a token without `=` maps to itself.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = Self::new();
        let mut tokens = tokens.into_iter();

        while let Some(token) = tokens.next() {
            let token = token.as_ref();
            let lowered = token.to_lowercase();

            let takes_value = is_source_flag(&lowered)
                || is_target_flag(&lowered)
                || (lowered.starts_with("--") && !token.contains('='));
            if takes_value {
                let value = tokens
                    .next()
                    .map(|v| v.as_ref().to_string())
                    .unwrap_or_default();
                args.insert(token, value);
                continue;
            }

            match token.split_once('=') {
                Some((key, value)) => args.insert(key.trim(), value.trim()),
                None => args.insert(token.trim(), token.trim()),
            }
        }
        args
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self { entries: map }
    }

    /// Insert or replace in place, keeping the original position.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.entries.insert(key.to_string(), value.into());
    }

    /// Add `key` only when it is not already present.
    pub fn insert_default(&mut self, key: &str, value: impl Into<Value>) {
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The overrides visible to a nested `pipeline` list: `--x` entries and
    /// plain `k=v` entries. Capability overrides only apply at the top level.
    pub fn children_scope(&self) -> PipelineArgs {
        PipelineArgs {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| k.starts_with("--") || !k.starts_with('-'))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// `(stage_id, attribute)` of a `--module.<stageId>.<attr>` key.
    pub fn module_override(key: &str) -> Option<(&str, &str)> {
        let parts: Vec<&str> = key.strip_prefix("--")?.split('.').collect();
        match parts.as_slice() {
            [scope, stage_id, attribute] if scope.eq_ignore_ascii_case(MODULE_OVERRIDE_SCOPE) => {
                Some((*stage_id, *attribute))
            }
            _ => None,
        }
    }

    /// `KEY` of a `--pipeline.<KEY>` environment key.
    pub fn pipeline_env(key: &str) -> Option<&str> {
        let parts: Vec<&str> = key.strip_prefix("--")?.split('.').collect();
        match parts.as_slice() {
            [scope, name] if scope.eq_ignore_ascii_case(PIPELINE_ENV_SCOPE) => Some(*name),
            _ => None,
        }
    }
}

pub fn is_source_flag(key: &str) -> bool {
    SOURCE_FLAGS.iter().any(|f| f.eq_ignore_ascii_case(key))
}

pub fn is_target_flag(key: &str) -> bool {
    TARGET_FLAGS.iter().any(|f| f.eq_ignore_ascii_case(key))
}

/// Render an override value for textual substitution.
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
