// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for stage registration and plugin loading.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A plugin module failed to register; none of its stages are kept.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_geoflow::observability::messages::registry::PluginLoadFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "missing library");
/// let msg = PluginLoadFailed {
///     plugin: "raster",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct PluginLoadFailed<'a> {
    pub plugin: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for PluginLoadFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Plugin '{}' excluded, registration failed: {}", self.plugin, self.error)
    }
}

impl StructuredLog for PluginLoadFailed<'_> {
    fn log(&self) {
        tracing::error!(plugin = self.plugin, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "plugin_load_failed",
            span_name = name,
            plugin = self.plugin,
            error = %self.error,
        )
    }
}

/// A stage reports itself unavailable and is skipped.
///
/// # Log Level
/// `info!` - Operational event
pub struct StageUnavailable<'a> {
    pub class_name: &'a str,
    pub plugin: &'a str,
}

impl Display for StageUnavailable<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' of plugin '{}' is unavailable and was skipped",
            self.class_name, self.plugin
        )
    }
}

impl StructuredLog for StageUnavailable<'_> {
    fn log(&self) {
        tracing::info!(class_name = self.class_name, plugin = self.plugin, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "stage_unavailable",
            span_name = name,
            class_name = self.class_name,
            plugin = self.plugin,
        )
    }
}

pub struct RegistryLoaded {
    pub stage_count: usize,
    pub plugin_count: usize,
}

impl Display for RegistryLoaded {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Module registry loaded: {} stages from {} plugins",
            self.stage_count, self.plugin_count
        )
    }
}

impl StructuredLog for RegistryLoaded {
    fn log(&self) {
        tracing::debug!(
            stage_count = self.stage_count,
            plugin_count = self.plugin_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "registry_loaded",
            span_name = name,
            stage_count = self.stage_count,
            plugin_count = self.plugin_count,
        )
    }
}
