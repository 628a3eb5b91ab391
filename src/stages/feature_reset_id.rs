// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::RunScope;
use crate::errors::StageError;
use crate::record::{Record, RecordStream};
use crate::traits::{Stage, StageKind};

#[derive(Default)]
pub struct FeatureResetId;

impl FeatureResetId {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for FeatureResetId {
    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn alias(&self) -> &str {
        "Feature Reset Id"
    }

    fn description(&self) -> &str {
        "Clears the identifier of every feature."
    }

    fn run<'s>(
        &'s self,
        input: RecordStream<'s>,
        _scope: RunScope<'s>,
    ) -> Result<RecordStream<'s>, StageError> {
        Ok(Box::new(input.map(|item| item.map(|record| Record { fid: None, ..record }))))
    }
}
