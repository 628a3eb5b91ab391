// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Test-only stages that record how the engine drives them.

use serde::Deserialize;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::engine::RunScope;
use crate::errors::{ConfigError, StageError};
use crate::record::RecordStream;
use crate::registry::{ModuleRegistry, PluginModule, StageRegistrar};
use crate::schema::SchemaDef;
use crate::traits::{bind_params, Params, Stage, StageFactory, StageKind};

/// Hook invocations of one stage id.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct HookCounts {
    pub starts: usize,
    pub runs: usize,
    pub finishes: usize,
}

/// Shared hook counters, keyed by stage id.
#[derive(Debug, Default, Clone)]
pub struct LifecycleCounters {
    counts: Rc<RefCell<HashMap<String, HookCounts>>>,
    cleans: Rc<Cell<usize>>,
    order: Rc<RefCell<Vec<String>>>,
}

impl LifecycleCounters {
    pub fn get(&self, stage_id: &str) -> HookCounts {
        self.counts.borrow().get(stage_id).copied().unwrap_or_default()
    }

    pub fn cleans(&self) -> usize {
        self.cleans.get()
    }

    /// `"<hook>:<stage id>"` entries in invocation order.
    pub fn order(&self) -> Vec<String> {
        self.order.borrow().clone()
    }

    fn bump(&self, stage_id: &str, hook: &str, update: impl FnOnce(&mut HookCounts)) {
        update(self.counts.borrow_mut().entry(stage_id.to_string()).or_default());
        self.order.borrow_mut().push(format!("{}:{}", hook, stage_id));
    }
}

/// Pass-through stage counting its hook invocations.
pub struct CountingStage {
    kind: StageKind,
    counters: LifecycleCounters,
}

impl CountingStage {
    pub fn new(counters: LifecycleCounters) -> Self {
        Self {
            kind: StageKind::Transform,
            counters,
        }
    }

    pub fn with_kind(mut self, kind: StageKind) -> Self {
        self.kind = kind;
        self
    }
}

impl Stage for CountingStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    fn alias(&self) -> &str {
        "Counting"
    }

    fn description(&self) -> &str {
        "Counts hook invocations."
    }

    fn starting_run(
        &self,
        input_schema: Option<SchemaDef>,
        scope: RunScope<'_>,
    ) -> Result<Option<SchemaDef>, StageError> {
        self.counters.bump(scope.stage_id(), "start", |c| c.starts += 1);
        Ok(input_schema)
    }

    fn run<'s>(
        &'s self,
        input: RecordStream<'s>,
        scope: RunScope<'s>,
    ) -> Result<RecordStream<'s>, StageError> {
        self.counters.bump(scope.stage_id(), "run", |c| c.runs += 1);
        Ok(input)
    }

    fn finished_run(&self, scope: RunScope<'_>) -> Result<bool, StageError> {
        self.counters.bump(scope.stage_id(), "finish", |c| c.finishes += 1);
        Ok(true)
    }

    fn clean(&self) {
        self.counters.cleans.set(self.counters.cleans.get() + 1);
    }
}

struct CountingFactory {
    class_name: &'static str,
    kind: StageKind,
    counters: LifecycleCounters,
}

impl StageFactory for CountingFactory {
    fn class_name(&self) -> &str {
        self.class_name
    }

    fn create(&self) -> Box<dyn Stage> {
        Box::new(CountingStage::new(self.counters.clone()).with_kind(self.kind))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FailingConfig {
    #[serde(default)]
    fail_at: String,
}

/// Pass-through stage failing in the hook named by its `failAt` parameter
/// (`starting_run`, `run`, `stream` or `finished_run`).
#[derive(Default)]
pub struct FailingStage {
    config: FailingConfig,
}

impl FailingStage {
    fn check(&self, hook: &str) -> Result<(), StageError> {
        if self.config.fail_at == hook {
            return Err(StageError::Other(format!("failing in {}", hook)));
        }
        Ok(())
    }
}

impl Stage for FailingStage {
    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn alias(&self) -> &str {
        "Failing"
    }

    fn description(&self) -> &str {
        "Fails on purpose."
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
        self.check("starting_run")?;
        Ok(input_schema)
    }

    fn run<'s>(
        &'s self,
        input: RecordStream<'s>,
        scope: RunScope<'s>,
    ) -> Result<RecordStream<'s>, StageError> {
        self.check("run")?;
        if self.config.fail_at != "stream" {
            return Ok(input);
        }
        let failure = crate::errors::PipelineError::stage_failed(
            scope.stage_id(),
            "run",
            StageError::Other("failing in stream".to_string()),
        );
        Ok(Box::new(input.take(1).chain(std::iter::once(Err(failure)))))
    }

    fn finished_run(&self, _scope: RunScope<'_>) -> Result<bool, StageError> {
        self.check("finished_run")?;
        Ok(true)
    }
}

struct TestStages {
    counters: LifecycleCounters,
}

impl PluginModule for TestStages {
    fn name(&self) -> &str {
        "testing"
    }

    fn register(&self, registrar: &mut StageRegistrar) -> Result<(), ConfigError> {
        registrar.register(CountingFactory {
            class_name: "Counting",
            kind: StageKind::Transform,
            counters: self.counters.clone(),
        });
        registrar.register(CountingFactory {
            class_name: "CountingSink",
            kind: StageKind::Sink,
            counters: self.counters.clone(),
        });
        registrar.register_fn("Failing", || Box::new(FailingStage::default()));
        Ok(())
    }
}

/// Built-in stages plus `Counting`, `CountingSink` and `Failing`.
pub fn test_registry_with(counters: &LifecycleCounters) -> ModuleRegistry {
    let plugin = TestStages {
        counters: counters.clone(),
    };
    ModuleRegistry::load(&[&plugin])
}

pub fn test_registry() -> ModuleRegistry {
    test_registry_with(&LifecycleCounters::default())
}

/// Inline FeatureCollection of point features, one per property map.
pub fn point_collection(srid: i32, properties: &[Value]) -> Value {
    let features: Vec<Value> = properties
        .iter()
        .enumerate()
        .map(|(i, props)| {
            json!({
                "type": "Feature",
                "properties": props,
                "geometry": { "type": "Point", "coordinates": [i as f64, 0.0] },
            })
        })
        .collect();
    json!({
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": format!("EPSG:{}", srid) } },
        "features": features,
    })
}
