mod registry;
mod selectors;

pub use registry::{ModelRegistry, ModelSpec, VISION_CAPABILITY};
pub use selectors::{Fallback, ModelSelection, ModelSelector};
