// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::ConfigError;
use crate::traits::{FnStageFactory, Stage, StageFactory};

/// A bundle of stage implementations that registers itself explicitly.
///
/// # Examples
///
/// ```
/// use the_geoflow::errors::ConfigError;
/// use the_geoflow::registry::{PluginModule, StageRegistrar};
///
/// struct EmptyPlugin;
///
/// impl PluginModule for EmptyPlugin {
///     fn name(&self) -> &str {
///         "empty"
///     }
///
///     fn register(&self, _registrar: &mut StageRegistrar) -> Result<(), ConfigError> {
///         Ok(())
///     }
/// }
/// ```
pub trait PluginModule {
    fn name(&self) -> &str;

    /// Location a descriptor's `moduleLocation` can refer to, e.g. a script
    /// or library path.
    fn location(&self) -> Option<&str> {
        None
    }

    fn register(&self, registrar: &mut StageRegistrar) -> Result<(), ConfigError>;
}

/// Collects the factories of one plugin during registration.
///
/// The registry only applies them once the plugin's `register` call has
/// succeeded, so a failing plugin contributes nothing.
#[derive(Default)]
pub struct StageRegistrar {
    factories: Vec<Box<dyn StageFactory>>,
}

impl StageRegistrar {
    pub fn register(&mut self, factory: impl StageFactory + 'static) {
        self.factories.push(Box::new(factory));
    }

    pub fn register_fn(&mut self, class_name: &'static str, constructor: fn() -> Box<dyn Stage>) {
        self.register(FnStageFactory::new(class_name, constructor));
    }

    pub(crate) fn into_factories(self) -> Vec<Box<dyn StageFactory>> {
        self.factories
    }
}
