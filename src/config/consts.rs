// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Stage class name of a descriptor.
pub const KEY_TYPE: &str = "type";
/// Stage identity; generated when absent.
pub const KEY_STAGE_ID: &str = "stageId";
/// Nested descriptor list (structural children).
pub const KEY_PIPELINE: &str = "pipeline";
pub const KEY_INPUT_STAGE_ID: &str = "inputStageId";
pub const KEY_OUTPUT_STAGE_ID: &str = "outputStageId";
/// Fan-in list of a join stage (also the side-channel list of `InputParam`).
pub const KEY_STAGES: &str = "stages";
/// Plugin location used when `type` is not registered.
pub const KEY_MODULE_LOCATION: &str = "moduleLocation";
/// Data source of source and sink stages.
pub const KEY_CONNECTION_STRING: &str = "connectionString";

pub const SOURCE_FLAGS: [&str; 3] = ["-source", "-i", "-input"];
pub const TARGET_FLAGS: [&str; 3] = ["-target", "-o", "-output"];

/// `--module.<stageId>.<attr>` overrides.
pub const MODULE_OVERRIDE_SCOPE: &str = "module";
/// `--pipeline.<KEY>` environment entries.
pub const PIPELINE_ENV_SCOPE: &str = "pipeline";

pub const ENV_FEATURE_CLASS: &str = "FEATURE_CLASS";
pub const ENV_PIPELINE_FOLDER: &str = "PIPELINE_FOLDER";
pub const ENV_PIPELINE_FILE: &str = "PIPELINE_FILE";
pub const ENV_PIPELINE_PATH: &str = "PIPELINE_PATH";

/// Layer name reported for inline GeoJSON collections.
pub const FEATURE_COLLECTION: &str = "FeatureCollection";

/// Prefix of the per-run scratch directory.
pub const TEMP_DIR_PREFIX: &str = "geoflow-";
/// Marker preceding the payload of a base64 data URL.
pub const BASE64_MARKER: &str = ";base64,";

pub const DEFAULT_LOG_LEVEL: &str = "info";
