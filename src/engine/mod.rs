// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline execution.
//!
//! * [`RunContext`] carries the per-run resources shared with every stage.
//! * The executor drives the start/stream/finish protocol (see [`RunScope`]
//!   for what a stage can see of a running pipeline, including the side
//!   channel to other stages).
//! * `Pipeline::run`, `Pipeline::run_with` and `Pipeline::extract` are the
//!   entry points, implemented here on the graph type.

mod context;
mod executor;
mod extractor;
mod run_state;
mod runner;


pub use context::{ReportSink, RunContext};
pub use executor::RunScope;
pub use extractor::{StageData, StageDataType};
pub use run_state::{RunPhase, RunState};
