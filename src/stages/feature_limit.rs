// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::engine::RunScope;
use crate::errors::{PipelineError, StageError};
use crate::record::RecordStream;
use crate::traits::{bind_params, ParamMetadata, Params, Stage, StageKind};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LimitConfig {
    #[serde(default)]
    count_limit: u64,
}

/// Fails the run when more than `countLimit` features flow through.
/// A limit of 0 disables the check.
#[derive(Default)]
pub struct FeatureLimit {
    config: LimitConfig,
}

impl FeatureLimit {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for FeatureLimit {
    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn alias(&self) -> &str {
        "Feature Limit"
    }

    fn description(&self) -> &str {
        "Raises an error when the number of features exceeds a limit."
    }

    fn params(&self) -> BTreeMap<String, ParamMetadata> {
        BTreeMap::from([(
            "countLimit".to_string(),
            ParamMetadata::new("Maximum number of features, 0 for no limit.", "int")
                .with_default(json!(0)),
        )])
    }

    fn configure(&mut self, params: &Params) -> Result<(), StageError> {
        self.config = bind_params(params)?;
        Ok(())
    }

    fn run<'s>(
        &'s self,
        input: RecordStream<'s>,
        scope: RunScope<'s>,
    ) -> Result<RecordStream<'s>, StageError> {
        let limit = self.config.count_limit;
        if limit == 0 {
            return Ok(input);
        }

        let mut count = 0u64;
        let mut exceeded = false;
        Ok(Box::new(input.map_while(move |item| {
            if exceeded {
                return None;
            }
            if item.is_ok() {
                count += 1;
            }
            if count > limit {
                exceeded = true;
                return Some(Err(PipelineError::stage_failed(
                    scope.stage_id(),
                    "run",
                    StageError::LimitExceeded(format!("more than {} features", limit)),
                )));
            }
            Some(item)
        })))
    }
}
