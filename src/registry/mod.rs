// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Registry of the stage implementations a pipeline can instantiate.
//!
//! Stages come from plugin modules that register their factories explicitly
//! (see [`PluginModule`]). The built-in stages are always registered first;
//! later plugins extend the map and replace entries with the same name.
//! Names are matched case-insensitively.
//!
//! A plugin attached with [`ModuleRegistry::register_detached`] is not part of
//! the name map: its stages are only reachable from a descriptor that names
//! the plugin's location in `moduleLocation`.
//!
//! # Examples
//!
//! ```
//! use the_geoflow::registry::ModuleRegistry;
//!
//! let registry = ModuleRegistry::with_builtins();
//! assert!(registry.contains("GeoJsonReader"));
//! assert!(registry.contains("featurelimit"));
//!
//! let catalog = registry.catalog();
//! assert_eq!(catalog["ConnectionJoin"].category, "Graph");
//! ```

mod catalog;
mod plugin;

pub use catalog::CatalogEntry;
pub use plugin::{PluginModule, StageRegistrar};

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::ConfigError;
use crate::observability::messages::registry::{PluginLoadFailed, RegistryLoaded, StageUnavailable};
use crate::observability::messages::StructuredLog;
use crate::stages::BuiltinStages;
use crate::traits::{Stage, StageFactory, StageKind, StoreCapability};

struct RegisteredStage {
    key: String,
    plugin: String,
    location: Option<String>,
    factory: Box<dyn StageFactory>,
}

#[derive(Default)]
pub struct ModuleRegistry {
    stages: Vec<RegisteredStage>,
    detached: Vec<RegisteredStage>,
    plugin_count: usize,
}

impl ModuleRegistry {
    /// An empty registry, without built-in stages.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        Self::load(&[])
    }

    /// Register the built-in stages followed by `plugins` in order.
    ///
    /// A plugin whose registration fails is logged and excluded.
    pub fn load(plugins: &[&dyn PluginModule]) -> Self {
        let mut registry = Self::new();
        let _ = registry.register_plugin(&BuiltinStages);

        for plugin in plugins {
            let _ = registry.register_plugin(*plugin);
        }

        RegistryLoaded {
            stage_count: registry.stages.len(),
            plugin_count: registry.plugin_count,
        }
        .log();
        registry
    }

    /// Register every available stage of `plugin`, replacing same-named
    /// entries. Returns the number of stages registered.
    pub fn register_plugin(&mut self, plugin: &dyn PluginModule) -> Result<usize, ConfigError> {
        let entries = Self::collect(plugin)?;
        let count = entries.len();

        for entry in entries {
            match self.stages.iter_mut().find(|s| s.key == entry.key) {
                Some(existing) => *existing = entry,
                None => self.stages.push(entry),
            }
        }
        self.plugin_count += 1;
        Ok(count)
    }

    /// Attach a plugin reachable only through `moduleLocation`.
    pub fn register_detached(&mut self, plugin: &dyn PluginModule) -> Result<usize, ConfigError> {
        let entries = Self::collect(plugin)?;
        let count = entries.len();
        self.detached.extend(entries);
        Ok(count)
    }

    fn collect(plugin: &dyn PluginModule) -> Result<Vec<RegisteredStage>, ConfigError> {
        let mut registrar = StageRegistrar::default();

        if let Err(error) = plugin.register(&mut registrar) {
            PluginLoadFailed {
                plugin: plugin.name(),
                error: &error,
            }
            .log();
            return Err(error);
        }

        let entries = registrar
            .into_factories()
            .into_iter()
            .filter(|factory| {
                let available = factory.is_available();
                if !available {
                    StageUnavailable {
                        class_name: factory.class_name(),
                        plugin: plugin.name(),
                    }
                    .log();
                }
                available
            })
            .map(|factory| RegisteredStage {
                key: factory.class_name().to_lowercase(),
                plugin: plugin.name().to_string(),
                location: plugin.location().map(str::to_string),
                factory,
            })
            .collect();
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered class names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.factory.class_name()).collect()
    }

    /// Look up a factory by bare or dotted class name.
    pub fn get(&self, type_name: &str) -> Option<&dyn StageFactory> {
        let full = type_name.to_lowercase();
        let short = class_name_of(type_name).to_lowercase();

        self.stages
            .iter()
            .find(|s| s.key == full)
            .or_else(|| self.stages.iter().find(|s| s.key == short))
            .map(|s| s.factory.as_ref())
    }

    /// Resolve a descriptor's `type`, falling back to the plugin at
    /// `location` when the name is not registered.
    pub fn resolve(
        &self,
        type_name: &str,
        location: Option<&str>,
    ) -> Result<&dyn StageFactory, ConfigError> {
        if let Some(factory) = self.get(type_name) {
            return Ok(factory);
        }

        let short = class_name_of(type_name).to_lowercase();
        location
            .and_then(|location| {
                self.stages
                    .iter()
                    .chain(self.detached.iter())
                    .filter(|s| s.key == short)
                    .find(|s| {
                        s.location
                            .as_deref()
                            .is_some_and(|own| same_location(own, location))
                    })
            })
            .map(|s| s.factory.as_ref())
            .ok_or_else(|| ConfigError::UnsupportedStageType(type_name.to_string()))
    }

    /// Create a fresh instance of the first registered stage of `kind` that
    /// accepts `data_source` with `capability`.
    pub fn find_by_data_source(
        &self,
        data_source: &Value,
        kind: StageKind,
        capability: StoreCapability,
    ) -> Option<(String, Box<dyn Stage>)> {
        self.stages.iter().find_map(|s| {
            let stage = s.factory.create();
            (stage.kind() == kind && stage.test_capability(data_source, capability))
                .then(|| (s.factory.class_name().to_string(), stage))
        })
    }

    /// Descriptive metadata of every registered stage, keyed by class name.
    pub fn catalog(&self) -> BTreeMap<String, CatalogEntry> {
        self.stages
            .iter()
            .map(|s| {
                let name = s.factory.class_name();
                let stage = s.factory.create();
                (name.to_string(), CatalogEntry::describe(name, stage.as_ref()))
            })
            .collect()
    }

    /// Name of the plugin that registered `type_name`.
    pub fn plugin_of(&self, type_name: &str) -> Option<&str> {
        let key = type_name.to_lowercase();
        self.stages
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.plugin.as_str())
    }
}

fn class_name_of(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}

fn same_location(own: &str, requested: &str) -> bool {
    if own == requested {
        return true;
    }
    match (Path::new(own).file_name(), Path::new(requested).file_name()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::{CountingStage, LifecycleCounters};
    use crate::traits::FnStageFactory;

    struct TestPlugin {
        name: &'static str,
        location: Option<&'static str>,
        fail: bool,
    }

    fn counting() -> Box<dyn Stage> {
        Box::new(CountingStage::new(LifecycleCounters::default()))
    }

    impl PluginModule for TestPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn location(&self) -> Option<&str> {
            self.location
        }

        fn register(&self, registrar: &mut StageRegistrar) -> Result<(), ConfigError> {
            registrar.register_fn("Counting", counting);
            registrar.register(FnStageFactory::new("NeedsGdal", counting).unavailable());
            if self.fail {
                return Err(ConfigError::PluginFailed {
                    plugin: self.name.to_string(),
                    reason: "broken".to_string(),
                });
            }
            registrar.register_fn("FeatureLimit", counting);
            Ok(())
        }
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = ModuleRegistry::with_builtins();
        for name in [
            "GeoJsonReader",
            "GeoJsonWriter",
            "ConnectionJoin",
            "FeatureCache",
            "InputParam",
            "FeatureLimit",
            "FeatureResetId",
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(registry.contains("geodataflow.pipeline.filters.GEOJSONREADER"));
    }

    #[test]
    fn test_later_plugins_replace_and_skip_unavailable() {
        let plugin = TestPlugin { name: "extra", location: None, fail: false };
        let registry = ModuleRegistry::load(&[&plugin]);

        assert!(registry.contains("counting"));
        assert!(!registry.contains("NeedsGdal"));
        assert_eq!(registry.plugin_of("FeatureLimit"), Some("extra"));
        assert_eq!(registry.plugin_of("FeatureCache"), Some("builtin"));
    }

    #[test]
    fn test_failing_plugin_is_excluded_atomically() {
        let plugin = TestPlugin { name: "broken", location: None, fail: true };
        let registry = ModuleRegistry::load(&[&plugin]);

        assert!(!registry.contains("Counting"));
        assert_eq!(registry.plugin_of("FeatureLimit"), Some("builtin"));
    }

    #[test]
    fn test_detached_plugin_resolves_by_location_only() {
        let plugin = TestPlugin {
            name: "scripts",
            location: Some("/opt/plugins/counting.py"),
            fail: false,
        };
        let mut registry = ModuleRegistry::with_builtins();
        registry.register_detached(&plugin).unwrap();

        assert!(registry.get("Counting").is_none());
        assert!(matches!(
            registry.resolve("Counting", None),
            Err(ConfigError::UnsupportedStageType(_))
        ));
        assert!(registry.resolve("Counting", Some("counting.py")).is_ok());
        assert!(registry.resolve("Counting", Some("/opt/plugins/counting.py")).is_ok());
        assert!(registry.resolve("Counting", Some("other.py")).is_err());
    }

    #[test]
    fn test_find_by_data_source_uses_capability() {
        let registry = ModuleRegistry::with_builtins();

        let found = registry.find_by_data_source(
            &Value::String("/tmp/x.geojson".to_string()),
            StageKind::Source,
            StoreCapability::Read,
        );
        assert_eq!(found.map(|(name, _)| name), Some("GeoJsonReader".to_string()));

        let missing = registry.find_by_data_source(
            &Value::String("/tmp/x.shp".to_string()),
            StageKind::Source,
            StoreCapability::Read,
        );
        assert!(missing.is_none());
    }

    #[test]
    fn test_catalog_describes_stages() {
        let registry = ModuleRegistry::with_builtins();
        let catalog = registry.catalog();

        let limit = &catalog["FeatureLimit"];
        assert_eq!(limit.kind, StageKind::Transform);
        assert!(limit.params.contains_key("countLimit"));

        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["GeoJsonReader"]["type"], "source");
    }
}
