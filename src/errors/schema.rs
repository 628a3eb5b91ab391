// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::schema::GeometryType;
use thiserror::Error;

/// Schema errors. Always fatal, never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Merging schemas of different geometry type is not supported ({left:?} != {right:?})")]
    GeometryTypeMismatch {
        left: Option<GeometryType>,
        right: Option<GeometryType>,
    },

    #[error("Merging schemas of different spatial reference is not supported (EPSG:{left} != EPSG:{right})")]
    SpatialReferenceMismatch { left: i32, right: i32 },

    /// Field names are unique case-insensitively within one schema.
    #[error("Duplicate field name \"{0}\" in schema")]
    DuplicateField(String),
}
