//! Picks the vision model an analysis runs on.

use super::registry::{ModelRegistry, ModelSpec, VISION_CAPABILITY};
use crate::error::SelectionError;

/// Why the selected model is not the one asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// Nothing was requested.
    Default,
    /// The requested model is unknown or cannot read images.
    Unavailable { requested: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub fallback: Option<Fallback>,
}

impl ModelSelection {
    /// Only a replaced explicit request is worth telling the user about.
    pub fn notice(&self) -> Option<String> {
        match &self.fallback {
            Some(Fallback::Unavailable { requested }) => Some(format!(
                "Model '{requested}' cannot analyse images; using {}.",
                self.model.name
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    registry: ModelRegistry,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(ModelRegistry::new(None))
    }
}

impl ModelSelector {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// The first vision model in registry order.
    pub fn default_model(&self) -> Result<ModelSpec, SelectionError> {
        self.registry
            .by_capability(VISION_CAPABILITY)
            .into_iter()
            .next()
            .ok_or(SelectionError::NoVisionModel)
    }

    /// The requested model when it can read images, else the default.
    /// A blank request counts as none.
    pub fn select(&self, requested: Option<&str>) -> Result<ModelSelection, SelectionError> {
        let requested = requested.map(str::trim).filter(|name| !name.is_empty());
        let chosen = requested.and_then(|name| self.registry.ensure(name, VISION_CAPABILITY));
        if let Some(model) = chosen {
            return Ok(ModelSelection {
                model,
                fallback: None,
            });
        }
        let fallback = match requested {
            Some(name) => Fallback::Unavailable {
                requested: name.to_string(),
            },
            None => Fallback::Default,
        };
        Ok(ModelSelection {
            model: self.default_model()?,
            fallback: Some(fallback),
        })
    }
}
