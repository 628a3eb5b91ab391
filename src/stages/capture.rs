// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::{RunScope, StageDataType};
use crate::errors::StageError;
use crate::record::{empty_stream, RecordStream};
use crate::schema::SchemaDef;
use crate::traits::{Stage, StageKind};

pub(crate) const CAPTURE_CLASS: &str = "CaptureSink";

/// Terminal sink spliced in by an extraction. Keeps the schema it receives;
/// in schema mode it never pulls its input.
pub(crate) struct CaptureSink {
    mode: StageDataType,
    schema: Rc<RefCell<Option<SchemaDef>>>,
}

impl CaptureSink {
    pub(crate) fn new(mode: StageDataType, schema: Rc<RefCell<Option<SchemaDef>>>) -> Self {
        Self { mode, schema }
    }
}

impl Stage for CaptureSink {
    fn kind(&self) -> StageKind {
        StageKind::Sink
    }

    fn alias(&self) -> &str {
        "Capture"
    }

    fn description(&self) -> &str {
        "Captures the output of the stage it follows."
    }

    fn starting_run(
        &self,
        input_schema: Option<SchemaDef>,
        _scope: RunScope<'_>,
    ) -> Result<Option<SchemaDef>, StageError> {
        *self.schema.borrow_mut() = input_schema.clone();
        Ok(input_schema)
    }

    fn run<'s>(
        &'s self,
        input: RecordStream<'s>,
        _scope: RunScope<'s>,
    ) -> Result<RecordStream<'s>, StageError> {
        match self.mode {
            StageDataType::Schema => Ok(empty_stream()),
            StageDataType::Data => Ok(input),
        }
    }
}
