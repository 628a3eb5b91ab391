// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod factory;
pub mod stage;

pub use factory::{FnStageFactory, StageFactory};
pub use stage::{bind_params, stage_id_list, ParamMetadata, Params, Stage, StageKind, StoreCapability};
