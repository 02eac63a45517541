pub mod config;
pub mod history;
pub mod images;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod store;
pub mod validator;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use history::HistoryLookup;
pub use orchestrator::{FlowOutcome, Orchestrator, Submission};
pub use providers::{
    default_provider_registry, DryrunProvider, GeminiProvider, ModelProvider,
    ModelProviderRegistry, ModelRequest,
};
pub use store::{HttpRecordStore, RecordStore};
pub use validator::{validate_response, ModelResponse};
