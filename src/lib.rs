// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // overrides + engine settings
pub mod engine;     // pull-based run engine and extraction
pub mod errors;     // error handling
pub mod graph;      // pipeline graph and builder
pub mod observability;
pub mod record;     // features flowing between stages
pub mod registry;   // stage registry + plugin modules
pub mod schema;     // layer schemas
pub mod stages;     // built-in stages
pub mod traits;     // stage contract
