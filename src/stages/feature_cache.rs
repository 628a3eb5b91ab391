// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::cell::RefCell;

use crate::engine::RunScope;
use crate::errors::StageError;
use crate::record::{Record, RecordStream};
use crate::traits::{Stage, StageKind};

/// Keeps the records of its first complete pass and replays them to later
/// consumers, so upstream stages are evaluated once per run.
#[derive(Default)]
pub struct FeatureCache {
    cache: RefCell<Option<Vec<Record>>>,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for FeatureCache {
    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn alias(&self) -> &str {
        "Feature Cache"
    }

    fn description(&self) -> &str {
        "Caches the input features in memory for the rest of the run."
    }

    fn run<'s>(
        &'s self,
        mut input: RecordStream<'s>,
        _scope: RunScope<'s>,
    ) -> Result<RecordStream<'s>, StageError> {
        let cached = self.cache.borrow().clone();
        if let Some(records) = cached {
            return Ok(Box::new(records.into_iter().map(Ok)));
        }

        // An incomplete pass (error or early drop) never fills the cache.
        let cache = &self.cache;
        let mut pending = Some(Vec::new());
        Ok(Box::new(std::iter::from_fn(move || match input.next() {
            Some(Ok(record)) => {
                if let Some(pending) = pending.as_mut() {
                    pending.push(record.clone());
                }
                Some(Ok(record))
            }
            Some(Err(error)) => {
                pending = None;
                Some(Err(error))
            }
            None => {
                if let Some(records) = pending.take() {
                    *cache.borrow_mut() = Some(records);
                }
                None
            }
        })))
    }

    fn clean(&self) {
        self.cache.borrow_mut().take();
    }
}
