// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::traits::Stage;

/// Creates fresh instances of one stage class.
pub trait StageFactory {
    /// Short class name the stage is registered under (matched case-insensitively).
    fn class_name(&self) -> &str;

    /// Whether the stage can be used in this build, e.g. an optional
    /// dependency it needs is present. Unavailable stages are never registered.
    fn is_available(&self) -> bool {
        true
    }

    fn create(&self) -> Box<dyn Stage>;
}

/// Factory backed by a plain constructor function.
pub struct FnStageFactory {
    class_name: &'static str,
    constructor: fn() -> Box<dyn Stage>,
    available: bool,
}

impl FnStageFactory {
    pub fn new(class_name: &'static str, constructor: fn() -> Box<dyn Stage>) -> Self {
        Self {
            class_name,
            constructor,
            available: true,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

impl StageFactory for FnStageFactory {
    fn class_name(&self) -> &str {
        self.class_name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn create(&self) -> Box<dyn Stage> {
        (self.constructor)()
    }
}
