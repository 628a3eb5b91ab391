// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pull executor: reference-counted start/finish protocol and lazy streams.
//!
//! A run starts every terminal sink first, then drains and finishes them one
//! by one. Starting a stage visits its inputs depth-first before the stage
//! itself; a stage reached through a second path only gains a consumer.
//! Finishing mirrors that walk, and a stage's `finished_run` fires when its
//! last consumer is done. Both hooks therefore run once per stage per run.
//!
//! A schema query through the side channel keeps its targets started until
//! the querying stage finalizes, so pulling those targets later in the same
//! run only adds a consumer.
//!
//! Streams are opened lazily. Pulling the first record of a stage calls its
//! `run` over a freshly opened stream of its producer, so a stage shared by
//! two consumers is evaluated once per consumer.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use super::context::RunContext;
use super::run_state::{RunPhase, RunState};
use crate::config::consts::KEY_STAGES;
use crate::errors::{ConfigError, PipelineError};
use crate::graph::{Pipeline, StageIndex, StageNode};
use crate::observability::messages::engine::{
    StageFinished, StageShared, StageStarting, TeardownFailed,
};
use crate::observability::messages::graph::DanglingStageReference;
use crate::observability::messages::StructuredLog;
use crate::record::{empty_stream, Record, RecordStream};
use crate::schema::SchemaDef;
use crate::traits::stage_id_list;

pub(crate) struct Executor<'p> {
    pipeline: &'p Pipeline,
    context: &'p RunContext,
    phases: RefCell<HashMap<StageIndex, RunPhase>>,
    touched: RefCell<Vec<StageIndex>>,
    /// Side-channel targets held open by a stage, released when it finalizes.
    held: RefCell<HashMap<StageIndex, Vec<StageIndex>>>,
}

impl<'p> Executor<'p> {
    pub(crate) fn new(pipeline: &'p Pipeline, context: &'p RunContext) -> Self {
        Self {
            pipeline,
            context,
            phases: RefCell::new(HashMap::new()),
            touched: RefCell::new(Vec::new()),
            held: RefCell::new(HashMap::new()),
        }
    }

    /// Start every sink, then drain and finish them in order. Teardown always
    /// runs; the first error is returned afterwards.
    pub(crate) fn execute(
        &self,
        sinks: &[StageIndex],
        callback: &mut dyn FnMut(&str, &Record),
    ) -> Result<usize, PipelineError> {
        let result = self.drive(sinks, callback);
        self.teardown();
        result
    }

    fn drive(
        &self,
        sinks: &[StageIndex],
        callback: &mut dyn FnMut(&str, &Record),
    ) -> Result<usize, PipelineError> {
        for &sink in sinks {
            self.start(sink)?;
        }

        let mut count = 0;
        for &sink in sinks {
            let sink_id = self.pipeline.node(sink).id();
            for record in self.open_stream(sink) {
                callback(sink_id, &record?);
                count += 1;
            }
            self.finish(sink)?;
        }
        Ok(count)
    }

    pub(crate) fn phase(&self, index: StageIndex) -> RunPhase {
        self.phases.borrow().get(&index).cloned().unwrap_or_default()
    }

    fn set_phase(&self, index: StageIndex, phase: RunPhase) {
        self.phases.borrow_mut().insert(index, phase);
    }

    fn touch(&self, index: StageIndex) {
        let mut touched = self.touched.borrow_mut();
        if !touched.contains(&index) {
            touched.push(index);
        }
    }

    /// Starting visit of `index`; returns its output schema.
    pub(crate) fn start(&self, index: StageIndex) -> Result<Option<SchemaDef>, PipelineError> {
        let node = self.pipeline.node(index);
        let already_started = match self.phases.borrow().get(&index) {
            Some(RunPhase::Starting) | Some(RunPhase::Finalizing) => {
                return Err(ConfigError::CyclicGraph(node.id().to_string()).into())
            }
            Some(RunPhase::Started(_)) => true,
            _ => false,
        };

        if !already_started {
            self.set_phase(index, RunPhase::Starting);
            self.touch(index);
        }

        let mut schemas = Vec::with_capacity(node.adjacency().inputs.len());
        for &input in &node.adjacency().inputs {
            match self.start(input) {
                Ok(schema) => schemas.push(schema),
                Err(error) => {
                    if !already_started {
                        self.set_phase(index, RunPhase::Unstarted);
                    }
                    return Err(error);
                }
            }
        }

        if already_started {
            let shared = self
                .phases
                .borrow_mut()
                .get_mut(&index)
                .and_then(RunPhase::state_mut)
                .map(|state| {
                    state.consumers += 1;
                    (state.consumers, state.schema.clone())
                });
            if let Some((consumers, schema)) = shared {
                StageShared {
                    stage_id: node.id(),
                    consumers,
                }
                .log();
                return Ok(schema);
            }
        }

        let result = self.start_fresh(index, node, &schemas);
        if result.is_err() {
            self.set_phase(index, RunPhase::Unstarted);
        }
        result
    }

    fn start_fresh(
        &self,
        index: StageIndex,
        node: &StageNode,
        schemas: &[Option<SchemaDef>],
    ) -> Result<Option<SchemaDef>, PipelineError> {
        let input_schema = SchemaDef::merge_all(schemas.iter().flatten())?;
        let producer = if node.stage().is_join() {
            None
        } else {
            node.adjacency().inputs.last().copied()
        };

        StageStarting {
            stage_id: node.id(),
            class_name: node.class_name(),
            input_count: node.adjacency().inputs.len(),
        }
        .log();

        let schema = node
            .stage()
            .starting_run(input_schema.clone(), RunScope::new(self, index))
            .map_err(|e| PipelineError::stage_failed(node.id(), "starting_run", e))?;

        self.set_phase(
            index,
            RunPhase::Started(RunState {
                input_schema,
                producer,
                schema: schema.clone(),
                consumers: 1,
            }),
        );
        Ok(schema)
    }

    /// Finishing visit of `index`: release one consumer, finalize at zero,
    /// then visit the inputs.
    pub(crate) fn finish(&self, index: StageIndex) -> Result<(), PipelineError> {
        let remaining = self
            .phases
            .borrow_mut()
            .get_mut(&index)
            .and_then(RunPhase::state_mut)
            .map(|state| {
                state.consumers = state.consumers.saturating_sub(1);
                state.consumers
            });
        let Some(remaining) = remaining else {
            return Ok(());
        };

        let mut result = if remaining == 0 {
            let finalized = self.finalize(index, false);
            let released = self.release(index);
            finalized.and(released)
        } else {
            Ok(())
        };

        for &input in &self.pipeline.node(index).adjacency().inputs {
            let finished = self.finish(input);
            if result.is_ok() {
                result = finished;
            }
        }
        result
    }

    /// Keep `target` started on behalf of `holder`.
    fn hold(&self, holder: StageIndex, target: StageIndex) {
        self.held.borrow_mut().entry(holder).or_default().push(target);
    }

    /// Finish every target held by `holder`; the first error wins.
    fn release(&self, holder: StageIndex) -> Result<(), PipelineError> {
        let targets = self.held.borrow_mut().remove(&holder).unwrap_or_default();
        let mut result = Ok(());
        for target in targets {
            let finished = self.finish(target);
            if result.is_ok() {
                result = finished;
            }
        }
        result
    }

    fn finalize(&self, index: StageIndex, forced: bool) -> Result<(), PipelineError> {
        let node = self.pipeline.node(index);
        self.set_phase(index, RunPhase::Finalizing);
        let result = node.stage().finished_run(RunScope::new(self, index));
        self.set_phase(index, RunPhase::Done);

        StageFinished {
            stage_id: node.id(),
            forced,
        }
        .log();
        result
            .map(|_| ())
            .map_err(|e| PipelineError::stage_failed(node.id(), "finished_run", e))
    }

    /// Force-finalize every stage still holding run state, then clean all stages.
    fn teardown(&self) {
        let touched = self.touched.borrow().clone();
        for index in touched {
            if !self.phase(index).is_started() {
                continue;
            }
            if let Err(error) = self.finalize(index, true) {
                TeardownFailed {
                    stage_id: self.pipeline.node(index).id(),
                    error: &error,
                }
                .log();
            }
        }

        for node in self.pipeline.stages() {
            node.stage().clean();
        }
    }

    /// A fresh, lazily opened output stream of `index`.
    pub(crate) fn open_stream(&self, index: StageIndex) -> RecordStream<'_> {
        Box::new(Deferred {
            executor: self,
            stage: index,
            inner: None,
            exhausted: false,
        })
    }

    fn run_stage(&self, index: StageIndex) -> Result<RecordStream<'_>, PipelineError> {
        let node = self.pipeline.node(index);
        let input = if node.stage().is_join() {
            self.join_stream(node)
        } else {
            match self.phase(index).state().and_then(|state| state.producer) {
                Some(producer) => self.open_stream(producer),
                None => empty_stream(),
            }
        };

        node.stage()
            .run(input, RunScope::new(self, index))
            .map_err(|e| PipelineError::stage_failed(node.id(), "run", e))
    }

    /// Concatenation of the `stages` streams of a join, in declaration order.
    /// Identifiers that do not resolve are logged and skipped.
    fn join_stream<'a>(&'a self, node: &StageNode) -> RecordStream<'a> {
        let targets: Vec<StageIndex> = stage_id_list(node.param(KEY_STAGES))
            .iter()
            .filter_map(|stage_id| {
                let found = self.pipeline.find(stage_id);
                if found.is_none() {
                    DanglingStageReference {
                        stage_id: node.id(),
                        reference: stage_id,
                        edge: KEY_STAGES,
                    }
                    .log();
                }
                found
            })
            .collect();

        Box::new(targets.into_iter().flat_map(move |index| self.open_stream(index)))
    }
}

struct Deferred<'a> {
    executor: &'a Executor<'a>,
    stage: StageIndex,
    inner: Option<RecordStream<'a>>,
    exhausted: bool,
}

impl<'a> Iterator for Deferred<'a> {
    type Item = Result<Record, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        if self.inner.is_none() {
            match self.executor.run_stage(self.stage) {
                Ok(stream) => self.inner = Some(stream),
                Err(error) => {
                    self.exhausted = true;
                    return Some(Err(error));
                }
            }
        }

        let item = self.inner.as_mut().and_then(|stream| stream.next());
        if item.is_none() {
            self.exhausted = true;
            self.inner = None;
        }
        item
    }
}

/// A stage's view of the running pipeline, passed to every hook.
///
/// Besides read access to the run, the scope is the side channel: a stage
/// may resolve the schema or pull the output of any other stage by id.
#[derive(Clone, Copy)]
pub struct RunScope<'s> {
    executor: &'s Executor<'s>,
    stage: StageIndex,
}

impl<'s> RunScope<'s> {
    pub(crate) fn new(executor: &'s Executor<'s>, stage: StageIndex) -> Self {
        Self { executor, stage }
    }

    pub fn stage_id(&self) -> &'s str {
        self.executor.pipeline.node(self.stage).id()
    }

    pub fn context(&self) -> &'s RunContext {
        self.executor.context
    }

    pub fn pipeline(&self) -> &'s Pipeline {
        self.executor.pipeline
    }

    /// Output schemas of the stage's started inputs, in edge order.
    pub fn input_schemas(&self) -> Vec<SchemaDef> {
        let phases = self.executor.phases.borrow();
        self.executor
            .pipeline
            .node(self.stage)
            .adjacency()
            .inputs
            .iter()
            .filter_map(|input| phases.get(input).and_then(RunPhase::state))
            .filter_map(|state| state.schema.clone())
            .collect()
    }

    /// The stage's merged input schema, once started.
    pub fn input_schema(&self) -> Option<SchemaDef> {
        self.executor.phase(self.stage).state().and_then(|s| s.input_schema.clone())
    }

    /// The stage's own output schema, once started.
    pub fn schema(&self) -> Option<SchemaDef> {
        self.executor.phase(self.stage).state().and_then(|s| s.schema.clone())
    }

    fn resolve(&self, stage_ids: &[String]) -> Result<Vec<StageIndex>, PipelineError> {
        stage_ids
            .iter()
            .map(|id| {
                self.executor
                    .pipeline
                    .find(id)
                    .ok_or_else(|| ConfigError::StageNotFound(id.clone()).into())
            })
            .collect()
    }

    /// Merged output schema of the named stages.
    ///
    /// Each target is started and stays started until this stage finalizes,
    /// so a later [`RunScope::enumerate_inputs`] of the same targets does not
    /// run their start and finish hooks a second time.
    pub fn schema_of(&self, stage_ids: &[String]) -> Result<Option<SchemaDef>, PipelineError> {
        let mut schemas = Vec::new();
        for target in self.resolve(stage_ids)? {
            let schema = self.executor.start(target)?;
            self.executor.hold(self.stage, target);
            schemas.extend(schema);
        }
        Ok(SchemaDef::merge_all(&schemas)?)
    }

    /// Records of the named stages, one stage after the other.
    ///
    /// Every id must resolve. Each target is started when the stream first
    /// reaches it and finished once drained or when the stream is dropped.
    pub fn enumerate_inputs(&self, stage_ids: &[String]) -> Result<RecordStream<'s>, PipelineError> {
        let targets = self.resolve(stage_ids)?;
        Ok(Box::new(SideChannel {
            executor: self.executor,
            targets: targets.into(),
            current: None,
            failed: false,
        }))
    }
}

struct SideChannel<'a> {
    executor: &'a Executor<'a>,
    targets: VecDeque<StageIndex>,
    current: Option<(StageIndex, RecordStream<'a>)>,
    failed: bool,
}

impl<'a> Iterator for SideChannel<'a> {
    type Item = Result<Record, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }

            if self.current.is_none() {
                let target = self.targets.pop_front()?;
                if let Err(error) = self.executor.start(target) {
                    self.failed = true;
                    return Some(Err(error));
                }
                self.current = Some((target, self.executor.open_stream(target)));
            }

            let (target, stream) = self.current.as_mut()?;
            let target = *target;
            if let Some(item) = stream.next() {
                return Some(item);
            }

            self.current = None;
            if let Err(error) = self.executor.finish(target) {
                self.failed = true;
                return Some(Err(error));
            }
        }
    }
}

impl Drop for SideChannel<'_> {
    fn drop(&mut self) {
        if let Some((target, stream)) = self.current.take() {
            drop(stream);
            if let Err(error) = self.executor.finish(target) {
                TeardownFailed {
                    stage_id: self.executor.pipeline.node(target).id(),
                    error: &error,
                }
                .log();
            }
        }
    }
}
