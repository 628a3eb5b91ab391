// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::graph::StageIndex;
use crate::schema::SchemaDef;

/// Transient state of a started stage, discarded when it finalizes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    /// Merged schema of the stage's inputs.
    pub input_schema: Option<SchemaDef>,
    /// Single upstream stage pulled by `run`; `None` for sources and joins.
    pub producer: Option<StageIndex>,
    /// Output schema returned by `starting_run`.
    pub schema: Option<SchemaDef>,
    /// Downstream paths still holding the stage open.
    pub consumers: usize,
}

/// Lifecycle of one stage within one run.
///
/// `Unstarted -> Starting -> Started -> Finalizing -> Done`. A `Done` stage
/// reached again through the side channel restarts.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RunPhase {
    #[default]
    Unstarted,
    Starting,
    Started(RunState),
    Finalizing,
    Done,
}

impl RunPhase {
    pub fn is_started(&self) -> bool {
        matches!(self, RunPhase::Started(_))
    }

    pub fn state(&self) -> Option<&RunState> {
        match self {
            RunPhase::Started(state) => Some(state),
            _ => None,
        }
    }

    pub fn state_mut(&mut self) -> Option<&mut RunState> {
        match self {
            RunPhase::Started(state) => Some(state),
            _ => None,
        }
    }
}
