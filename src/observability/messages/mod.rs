// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message is a plain struct implementing `Display` for the human-readable
//! text and [`StructuredLog`] for emitting the event (or opening a span) with
//! typed fields at the message's level.
//!
//! # Organization
//!
//! * `engine` - run lifecycle, stage hooks, extraction
//! * `graph` - descriptor parsing, overrides and tree wiring
//! * `registry` - stage registration and plugin loading
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_geoflow::observability::messages::graph::DanglingStageReference;
//! use the_geoflow::observability::messages::StructuredLog;
//!
//! let msg = DanglingStageReference {
//!     stage_id: "writer",
//!     reference: "missing",
//!     edge: "inputStageId",
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod engine;
pub mod graph;
pub mod registry;

/// Emit a message as a structured tracing event or span.
pub trait StructuredLog {
    /// Emit the event at the message's level with its fields attached.
    fn log(&self);

    /// Open a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
