// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Schema value types propagated through the stage graph during the
//! starting phase of a run.

mod field_def;
mod schema_def;

pub use field_def::{DataType, FieldDef};
pub use schema_def::{Envelope, GeometryType, SchemaDef};
