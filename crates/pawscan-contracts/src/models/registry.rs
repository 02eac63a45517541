use indexmap::IndexMap;

pub const VISION_CAPABILITY: &str = "vision";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

/// Known models in preference order; the first one supporting a
/// capability is its default.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    insert("gemini-2.5-flash", "gemini", &["vision", "text"]);
    insert("gemini-2.5-pro", "gemini", &["vision", "text"]);
    insert("gemini-2.0-flash", "gemini", &["vision", "text"]);
    insert("dryrun-vision-1", "dryrun", &["vision"]);

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vision_model_is_gemini_flash() {
        let registry = ModelRegistry::new(None);
        let vision = registry.by_capability(VISION_CAPABILITY);
        assert_eq!(vision[0].name, "gemini-2.5-flash");
        assert_eq!(vision[0].provider, "gemini");
        assert!(vision.iter().any(|model| model.provider == "dryrun"));
    }

    #[test]
    fn ensure_checks_capability() {
        let registry = ModelRegistry::new(None);
        assert!(registry.ensure("dryrun-vision-1", "vision").is_some());
        assert!(registry.ensure("dryrun-vision-1", "text").is_none());
        assert!(registry.ensure("missing", "vision").is_none());
    }
}
