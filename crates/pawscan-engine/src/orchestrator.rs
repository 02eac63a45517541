//! Submission state machine: user check, optional registration, one model
//! call, context check, one history write.

use pawscan_contracts::diagnosis::DiagnosticReport;
use pawscan_contracts::error::FlowError;
use pawscan_contracts::events::{EventPayload, EventWriter};
use pawscan_contracts::flow::FlowState;
use pawscan_contracts::images::ImageSource;
use pawscan_contracts::pet::{validate_submission, Dni, PetProfile, ValidatedPet};
use pawscan_contracts::records::{Consultation, HistoryDraft, UserRecord};
use serde_json::{json, Map, Value};

use crate::images;
use crate::prompt::{response_schema, AnalysisRequest, SYSTEM_INSTRUCTION};
use crate::providers::{ModelProvider, ModelRequest};
use crate::store::RecordStore;
use crate::validator::validate_response;

pub const MIN_NAME_CHARS: usize = 3;

/// Raw form input for one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub pet: PetProfile,
    pub description: String,
    pub images: Vec<ImageSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    Completed {
        consultation: Consultation,
        report: DiagnosticReport,
    },
    /// The owner is unknown; call `register_user` or `cancel`.
    AwaitingRegistration { owner_dni: Dni },
}

struct Suspended {
    submission: Submission,
    pet: ValidatedPet,
}

pub struct Orchestrator<'a> {
    provider: &'a dyn ModelProvider,
    store: &'a dyn RecordStore,
    model: String,
    events: EventWriter,
    state: FlowState,
    transitions: Vec<FlowState>,
    last_submission: Option<Submission>,
    suspended: Option<Suspended>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        provider: &'a dyn ModelProvider,
        model: impl Into<String>,
        store: &'a dyn RecordStore,
        events: EventWriter,
    ) -> Self {
        Self {
            provider,
            store,
            model: model.into(),
            events,
            state: FlowState::Idle,
            transitions: Vec::new(),
            last_submission: None,
            suspended: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// States entered during the current attempt, in order.
    pub fn transitions(&self) -> &[FlowState] {
        &self.transitions
    }

    /// True while a submission is running or waiting for a name. Callers
    /// should not submit again until this clears.
    pub fn is_busy(&self) -> bool {
        self.state.is_in_flight() || self.state == FlowState::AwaitingRegistration
    }

    pub fn submit(&mut self, submission: Submission) -> Result<FlowOutcome, FlowError> {
        if self.is_busy() {
            return Err(self.invalid_state("submit"));
        }
        self.last_submission = Some(submission.clone());
        self.run(submission)
    }

    /// Replays the last submission after a failure. Each call is a new
    /// attempt with its own remote calls.
    pub fn resubmit(&mut self) -> Result<FlowOutcome, FlowError> {
        if !matches!(self.state, FlowState::Errored(_)) {
            return Err(self.invalid_state("resubmit"));
        }
        let Some(submission) = self.last_submission.clone() else {
            return Err(self.invalid_state("resubmit"));
        };
        self.run(submission)
    }

    /// Resumes a flow suspended for registration. A short name leaves the
    /// flow suspended so another name can be tried.
    pub fn register_user(&mut self, name: &str) -> Result<FlowOutcome, FlowError> {
        if self.state != FlowState::AwaitingRegistration {
            return Err(self.invalid_state("register a user"));
        }
        let name = name.trim();
        if name.chars().filter(|c| !c.is_whitespace()).count() < MIN_NAME_CHARS {
            return Err(FlowError::NameTooShort);
        }
        let Some(Suspended { submission, pet }) = self.suspended.take() else {
            return Err(self.invalid_state("register a user"));
        };

        self.enter(FlowState::CheckingUser);
        let user = UserRecord {
            dni: pet.owner_dni.clone(),
            name: name.to_string(),
        };
        if let Err(err) = self.store.create_user(&user) {
            return self.fail(FlowError::UserCreationFailed(err.message().to_string()));
        }
        self.log("user_registered", json!({ "owner_dni": user.dni.as_str() }));
        self.analyze(&submission, pet)
    }

    /// Abandons a flow waiting for registration. Nothing remote has been
    /// written at that point.
    pub fn cancel(&mut self) -> Result<(), FlowError> {
        if self.state != FlowState::AwaitingRegistration {
            return Err(self.invalid_state("cancel"));
        }
        self.suspended = None;
        self.enter(FlowState::Idle);
        self.log("flow_cancelled", json!({}));
        Ok(())
    }

    fn run(&mut self, submission: Submission) -> Result<FlowOutcome, FlowError> {
        self.transitions.clear();
        self.suspended = None;
        self.events = self.events.for_submission(uuid::Uuid::new_v4().to_string());
        let image_ids: Vec<String> = submission.images.iter().map(images::fingerprint).collect();
        self.log(
            "submission_started",
            json!({ "images": submission.images.len(), "image_ids": image_ids }),
        );

        self.enter(FlowState::ValidatingForm);
        let pet = match validate_submission(
            &submission.description,
            submission.images.len(),
            &submission.pet,
        ) {
            Ok(pet) => pet,
            Err(issues) => return self.fail(FlowError::FormValidation(issues)),
        };

        self.enter(FlowState::CheckingUser);
        match self.store.find_user(&pet.owner_dni) {
            Ok(Some(_)) => self.analyze(&submission, pet),
            Ok(None) => {
                let owner_dni = pet.owner_dni.clone();
                self.suspended = Some(Suspended { submission, pet });
                self.enter(FlowState::AwaitingRegistration);
                Ok(FlowOutcome::AwaitingRegistration { owner_dni })
            }
            Err(err) => self.fail(FlowError::UserLookupFailed(err)),
        }
    }

    fn analyze(
        &mut self,
        submission: &Submission,
        pet: ValidatedPet,
    ) -> Result<FlowOutcome, FlowError> {
        self.enter(FlowState::BuildingRequest);
        let payloads = match images::encode_all(&submission.images) {
            Ok(payloads) => payloads,
            Err(err) => return self.fail(err.into()),
        };
        let request = match AnalysisRequest::new(
            &submission.description,
            payloads,
            submission.pet.clone(),
            submission.pet.language,
        ) {
            Ok(request) => request,
            Err(err) => return self.fail(err.into()),
        };

        self.enter(FlowState::CallingModel);
        let model_request = ModelRequest {
            model: self.model.clone(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            parts: request.parts(),
            response_schema: response_schema(),
            language: request.language(),
        };
        let response = match self.provider.generate(&model_request) {
            Ok(response) => response,
            Err(err) => return self.fail(err.into()),
        };
        self.log(
            "model_called",
            json!({
                "model": self.model,
                "provider": self.provider.name(),
                "candidates": response.candidates.len(),
            }),
        );

        self.enter(FlowState::CheckingContext);
        let report = match validate_response(&response) {
            Ok(report) => report,
            Err(err) => return self.fail(err.into()),
        };
        if !report.context_valid {
            return self.fail(FlowError::ContextInvalid(report.context_message.clone()));
        }
        let stray = report.findings_with_unknown_image(request.image_count()).len();
        if stray > 0 {
            self.log("findings_unmatched", json!({ "count": stray }));
        }
        let inconsistent: Vec<String> = report
            .medications_with_inconsistent_store()
            .into_iter()
            .map(|medication| medication.name.clone())
            .collect();
        if !inconsistent.is_empty() {
            self.log("medications_inconsistent", json!({ "medications": inconsistent }));
        }

        self.enter(FlowState::Persisting);
        let draft = match HistoryDraft::new(&pet, &report) {
            Ok(draft) => draft,
            Err(err) => return self.fail(FlowError::PersistenceFailed(err.to_string())),
        };
        let created = match self.store.create_history(&draft) {
            Ok(created) => created,
            Err(err) => return self.fail(FlowError::PersistenceFailed(err.message().to_string())),
        };
        let Some(code) = created.code.filter(|code| !code.trim().is_empty()) else {
            return self.fail(FlowError::MissingCode);
        };

        self.enter(FlowState::Done);
        self.log(
            "history_created",
            json!({ "code": code, "owner_dni": pet.owner_dni.as_str() }),
        );
        let mut report = report;
        report.consultation_code = Some(code.clone());
        Ok(FlowOutcome::Completed {
            consultation: Consultation {
                code,
                owner_dni: pet.owner_dni,
            },
            report,
        })
    }

    fn enter(&mut self, next: FlowState) {
        let previous = self.state;
        self.state = next;
        self.transitions.push(next);
        self.log(
            "state_changed",
            json!({ "from": previous.to_string(), "to": next.to_string() }),
        );
    }

    fn fail(&mut self, err: FlowError) -> Result<FlowOutcome, FlowError> {
        let kind = err.kind();
        self.enter(FlowState::Errored(kind));
        self.log(
            "flow_failed",
            json!({
                "kind": kind.label(),
                "category": format!("{:?}", kind.category()),
                "message": err.to_string(),
            }),
        );
        Err(err)
    }

    fn invalid_state(&self, operation: &'static str) -> FlowError {
        FlowError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Event log failures never abort a submission.
    fn log(&self, event_type: &str, payload: Value) {
        let payload: EventPayload = match payload {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        let _ = self.events.emit(event_type, payload);
    }
}
