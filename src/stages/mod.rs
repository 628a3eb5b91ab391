// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in stages, registered by every [`ModuleRegistry`](crate::registry::ModuleRegistry).

pub(crate) mod capture;
mod connection_join;
mod feature_cache;
mod feature_limit;
mod feature_reset_id;
mod geojson_reader;
mod geojson_writer;
mod input_param;

#[cfg(test)]
pub(crate) mod testing;

pub use connection_join::ConnectionJoin;
pub use feature_cache::FeatureCache;
pub use feature_limit::FeatureLimit;
pub use feature_reset_id::FeatureResetId;
pub use geojson_reader::GeoJsonReader;
pub use geojson_writer::GeoJsonWriter;
pub use input_param::InputParam;

use crate::errors::ConfigError;
use crate::registry::{PluginModule, StageRegistrar};

/// The plugin module of the built-in stages.
pub struct BuiltinStages;

impl PluginModule for BuiltinStages {
    fn name(&self) -> &str {
        "builtin"
    }

    fn register(&self, registrar: &mut StageRegistrar) -> Result<(), ConfigError> {
        registrar.register_fn("GeoJsonReader", || Box::new(GeoJsonReader::new()));
        registrar.register_fn("GeoJsonWriter", || Box::new(GeoJsonWriter::new()));
        registrar.register_fn("ConnectionJoin", || Box::new(ConnectionJoin::new()));
        registrar.register_fn("FeatureCache", || Box::new(FeatureCache::new()));
        registrar.register_fn("InputParam", || Box::new(InputParam::new()));
        registrar.register_fn("FeatureLimit", || Box::new(FeatureLimit::new()));
        registrar.register_fn("FeatureResetId", || Box::new(FeatureResetId::new()));
        Ok(())
    }
}
