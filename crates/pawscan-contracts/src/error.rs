use thiserror::Error;

use crate::flow::{ErrorKind, FlowState};
use crate::pet::FormIssue;

/// How many characters of unparseable model output are kept for diagnostics.
pub const RAW_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("invalid image format: expected data:<mime>;base64,<payload>")]
    InvalidImageFormat,
    #[error("could not recognise the image type of a {0}-byte upload")]
    UnknownImageType(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("at least one image is required")]
    EmptyImageSet,
    #[error("symptom description is blank")]
    EmptyDescription,
}

/// Failures of the structured response validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("the model returned no candidates")]
    EmptyApiResponse,
    #[error("the model response has no text content")]
    MalformedContent,
    #[error("model output is not valid JSON: {message}")]
    InvalidJson { message: String, raw_excerpt: String },
    #[error("model output does not match the diagnostic schema: {detail}")]
    SchemaMismatch {
        missing: Vec<String>,
        detail: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record store unreachable: {0}")]
    Transport(String),
    /// The store answered, but not with an envelope: 5xx pages, empty bodies.
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Rejected(String),
    #[error("record store returned an unreadable payload: {0}")]
    InvalidPayload(String),
}

impl StoreError {
    /// The store-provided message, verbatim where there is one.
    pub fn message(&self) -> &str {
        match self {
            StoreError::Transport(message)
            | StoreError::Unavailable(message)
            | StoreError::Rejected(message)
            | StoreError::InvalidPayload(message) => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("model request failed: {0}")]
    Transport(String),
    #[error("model request failed ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("model returned an unreadable payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no vision model is registered")]
    NoVisionModel,
    #[error("model '{model}' needs provider '{provider}' (available: {available})")]
    ProviderMissing {
        model: String,
        provider: String,
        available: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("history not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Remote(StoreError),
    #[error("stored analysis for {code} is corrupt: {detail}")]
    CorruptRecord { code: String, detail: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error("form is incomplete: {}", join_issues(.0))]
    FormValidation(Vec<FormIssue>),
    #[error("name must have at least 3 characters")]
    NameTooShort,
    #[error("user lookup failed: {0}")]
    UserLookupFailed(StoreError),
    #[error("user registration failed: {0}")]
    UserCreationFailed(String),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("analysis service unavailable: {0}")]
    ModelUnavailable(#[from] ProviderError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("the submission could not be analysed: {0}")]
    ContextInvalid(String),
    #[error("history could not be saved: {0}")]
    PersistenceFailed(String),
    #[error("record store did not return a consultation code")]
    MissingCode,
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: FlowState,
    },
}

impl FlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::FormValidation(_) => ErrorKind::FormValidation,
            FlowError::NameTooShort => ErrorKind::NameTooShort,
            FlowError::UserLookupFailed(_) => ErrorKind::UserLookupFailed,
            FlowError::UserCreationFailed(_) => ErrorKind::UserCreationFailed,
            FlowError::Image(_) => ErrorKind::InvalidImageFormat,
            FlowError::Build(BuildError::EmptyImageSet) => ErrorKind::EmptyImageSet,
            FlowError::Build(BuildError::EmptyDescription) => ErrorKind::EmptyDescription,
            FlowError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            FlowError::Analysis(AnalysisError::EmptyApiResponse) => ErrorKind::EmptyApiResponse,
            FlowError::Analysis(AnalysisError::MalformedContent) => ErrorKind::MalformedContent,
            FlowError::Analysis(AnalysisError::InvalidJson { .. }) => ErrorKind::InvalidJson,
            FlowError::Analysis(AnalysisError::SchemaMismatch { .. }) => ErrorKind::SchemaMismatch,
            FlowError::ContextInvalid(_) => ErrorKind::ContextInvalid,
            FlowError::PersistenceFailed(_) => ErrorKind::PersistenceFailed,
            FlowError::MissingCode => ErrorKind::MissingCode,
            FlowError::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// Violated form fields, for inline display.
    pub fn form_issues(&self) -> &[FormIssue] {
        match self {
            FlowError::FormValidation(issues) => issues,
            _ => &[],
        }
    }
}

fn join_issues(issues: &[FormIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<String>>()
        .join("; ")
}

pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
