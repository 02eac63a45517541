use std::fmt;

/// States of a single analysis submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    Idle,
    ValidatingForm,
    CheckingUser,
    AwaitingRegistration,
    BuildingRequest,
    CallingModel,
    CheckingContext,
    Persisting,
    Done,
    Errored(ErrorKind),
}

impl FlowState {
    pub fn label(self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::ValidatingForm => "validating_form",
            FlowState::CheckingUser => "checking_user",
            FlowState::AwaitingRegistration => "awaiting_registration",
            FlowState::BuildingRequest => "building_request",
            FlowState::CallingModel => "calling_model",
            FlowState::CheckingContext => "checking_context",
            FlowState::Persisting => "persisting",
            FlowState::Done => "done",
            FlowState::Errored(_) => "errored",
        }
    }

    /// True while a remote call may be outstanding for this submission.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            FlowState::ValidatingForm
                | FlowState::CheckingUser
                | FlowState::BuildingRequest
                | FlowState::CallingModel
                | FlowState::CheckingContext
                | FlowState::Persisting
        )
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowState::Errored(kind) => write!(f, "errored:{}", kind.label()),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FormValidation,
    NameTooShort,
    UserLookupFailed,
    UserCreationFailed,
    InvalidImageFormat,
    EmptyImageSet,
    EmptyDescription,
    ModelUnavailable,
    EmptyApiResponse,
    MalformedContent,
    InvalidJson,
    SchemaMismatch,
    ContextInvalid,
    PersistenceFailed,
    MissingCode,
    InvalidState,
}

/// User-facing presentation bucket. Every kind maps to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Shown inline next to the offending fields.
    FormValidation,
    /// Dismissable notification carrying the remote message.
    RemoteUnavailable,
    /// The model answered but not in a usable shape.
    ModelIntegration,
    /// A valid result saying the input was unusable.
    ContextInvalid,
    /// The record store broke its contract.
    StoreIntegrity,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::FormValidation => "form_validation",
            ErrorKind::NameTooShort => "name_too_short",
            ErrorKind::UserLookupFailed => "user_lookup_failed",
            ErrorKind::UserCreationFailed => "user_creation_failed",
            ErrorKind::InvalidImageFormat => "invalid_image_format",
            ErrorKind::EmptyImageSet => "empty_image_set",
            ErrorKind::EmptyDescription => "empty_description",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::EmptyApiResponse => "empty_api_response",
            ErrorKind::MalformedContent => "malformed_content",
            ErrorKind::InvalidJson => "invalid_json",
            ErrorKind::SchemaMismatch => "schema_mismatch",
            ErrorKind::ContextInvalid => "context_invalid",
            ErrorKind::PersistenceFailed => "persistence_failed",
            ErrorKind::MissingCode => "missing_code",
            ErrorKind::InvalidState => "invalid_state",
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorKind::FormValidation
            | ErrorKind::NameTooShort
            | ErrorKind::InvalidImageFormat
            | ErrorKind::EmptyImageSet
            | ErrorKind::EmptyDescription
            | ErrorKind::InvalidState => ErrorCategory::FormValidation,
            ErrorKind::UserLookupFailed
            | ErrorKind::UserCreationFailed
            | ErrorKind::ModelUnavailable
            | ErrorKind::PersistenceFailed => ErrorCategory::RemoteUnavailable,
            ErrorKind::EmptyApiResponse
            | ErrorKind::MalformedContent
            | ErrorKind::InvalidJson
            | ErrorKind::SchemaMismatch => ErrorCategory::ModelIntegration,
            ErrorKind::ContextInvalid => ErrorCategory::ContextInvalid,
            ErrorKind::MissingCode => ErrorCategory::StoreIntegrity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errored_state_displays_its_kind() {
        assert_eq!(
            FlowState::Errored(ErrorKind::ContextInvalid).to_string(),
            "errored:context_invalid"
        );
        assert_eq!(FlowState::AwaitingRegistration.to_string(), "awaiting_registration");
    }

    #[test]
    fn suspended_and_terminal_states_are_not_in_flight() {
        assert!(!FlowState::Idle.is_in_flight());
        assert!(!FlowState::AwaitingRegistration.is_in_flight());
        assert!(!FlowState::Done.is_in_flight());
        assert!(!FlowState::Errored(ErrorKind::MissingCode).is_in_flight());
        assert!(FlowState::CallingModel.is_in_flight());
    }

    #[test]
    fn integrity_failures_have_their_own_category() {
        assert_eq!(ErrorKind::MissingCode.category(), ErrorCategory::StoreIntegrity);
        assert_eq!(ErrorKind::InvalidJson.category(), ErrorCategory::ModelIntegration);
        assert_eq!(ErrorKind::ContextInvalid.category(), ErrorCategory::ContextInvalid);
    }
}
