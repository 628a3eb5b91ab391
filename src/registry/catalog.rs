// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::collections::BTreeMap;

use crate::traits::{ParamMetadata, Stage, StageKind};

/// Descriptive metadata of one registered stage, for external tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StageKind,
    pub alias: String,
    pub category: String,
    pub description: String,
    pub params: BTreeMap<String, ParamMetadata>,
}

impl CatalogEntry {
    pub fn describe(name: &str, stage: &dyn Stage) -> Self {
        Self {
            name: name.to_string(),
            kind: stage.kind(),
            alias: stage.alias().to_string(),
            category: stage.category().to_string(),
            description: stage.description().to_string(),
            params: stage.params(),
        }
    }
}
