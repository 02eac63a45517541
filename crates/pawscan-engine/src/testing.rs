//! Counting fakes for the remote collaborators.

use std::sync::{Mutex, MutexGuard};

use pawscan_contracts::error::{ProviderError, StoreError};
use pawscan_contracts::images::ImageSource;
use pawscan_contracts::pet::{Dni, Gender, Language, PetProfile};
use pawscan_contracts::records::{
    Clinic, ClinicMedication, CreatedHistory, HistoryDraft, HistoryRecord, Specialty, UserRecord,
};
use serde_json::{json, Value};

use crate::providers::{ModelProvider, ModelRequest};
use crate::store::RecordStore;
use crate::validator::ModelResponse;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreCalls {
    pub find_user: usize,
    pub create_user: usize,
    pub create_history: usize,
    pub get_history: usize,
    pub list_histories: usize,
}

impl StoreCalls {
    pub fn total(&self) -> usize {
        self.find_user
            + self.create_user
            + self.create_history
            + self.get_history
            + self.list_histories
    }
}

#[derive(Default)]
struct FakeStoreState {
    users: Vec<UserRecord>,
    histories: Vec<HistoryRecord>,
    drafts: Vec<HistoryDraft>,
    lookup_error: Option<StoreError>,
    create_user_error: Option<StoreError>,
    create_history_reply: Option<Result<CreatedHistory, StoreError>>,
    read_error: Option<StoreError>,
    calls: StoreCalls,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<FakeStoreState>,
}

impl FakeStore {
    pub fn with_user(dni: &Dni, name: &str) -> Self {
        let store = Self::default();
        store.state().users.push(UserRecord {
            dni: dni.clone(),
            name: name.to_string(),
        });
        store
    }

    pub fn insert_history(&self, record: HistoryRecord) {
        self.state().histories.push(record);
    }

    pub fn fail_lookup(&self, err: StoreError) {
        self.state().lookup_error = Some(err);
    }

    pub fn fail_user_creation(&self, err: StoreError) {
        self.state().create_user_error = Some(err);
    }

    /// Overrides the default reply, which assigns `H-<n>`.
    pub fn reply_to_history(&self, reply: Result<CreatedHistory, StoreError>) {
        self.state().create_history_reply = Some(reply);
    }

    pub fn fail_reads(&self, err: StoreError) {
        self.state().read_error = Some(err);
    }

    pub fn calls(&self) -> StoreCalls {
        self.state().calls
    }

    pub fn drafts(&self) -> Vec<HistoryDraft> {
        self.state().drafts.clone()
    }

    pub fn users(&self) -> Vec<UserRecord> {
        self.state().users.clone()
    }

    fn state(&self) -> MutexGuard<'_, FakeStoreState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RecordStore for FakeStore {
    fn find_user(&self, dni: &Dni) -> Result<Option<UserRecord>, StoreError> {
        let mut state = self.state();
        state.calls.find_user += 1;
        if let Some(err) = state.lookup_error.clone() {
            return Err(err);
        }
        Ok(state.users.iter().find(|user| &user.dni == dni).cloned())
    }

    fn create_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.create_user += 1;
        if let Some(err) = state.create_user_error.clone() {
            return Err(err);
        }
        state.users.push(user.clone());
        Ok(())
    }

    fn create_history(&self, draft: &HistoryDraft) -> Result<CreatedHistory, StoreError> {
        let mut state = self.state();
        state.calls.create_history += 1;
        state.drafts.push(draft.clone());
        if let Some(reply) = state.create_history_reply.clone() {
            return reply;
        }
        let code = format!("H-{}", state.histories.len() + 1);
        state.histories.push(HistoryRecord {
            code: code.clone(),
            person_dni: draft.person_dni.clone(),
            animal_name: draft.animal_name.clone(),
            gender_of_animal: draft.gender_of_animal,
            average_weight: draft.average_weight,
            average_age: draft.average_age,
            gemini_response: draft.gemini_response.clone(),
            created_on: "2024-05-01T10:00:00Z".to_string(),
        });
        Ok(CreatedHistory {
            code: Some(code),
            created_on: Some("2024-05-01T10:00:00Z".to_string()),
        })
    }

    fn get_history(&self, code: &str, dni: &Dni) -> Result<HistoryRecord, StoreError> {
        let mut state = self.state();
        state.calls.get_history += 1;
        if let Some(err) = state.read_error.clone() {
            return Err(err);
        }
        state
            .histories
            .iter()
            .find(|record| record.code == code && &record.person_dni == dni)
            .cloned()
            .ok_or_else(|| StoreError::Rejected("Historial no encontrado".to_string()))
    }

    fn list_histories(&self, dni: &Dni) -> Result<Vec<HistoryRecord>, StoreError> {
        let mut state = self.state();
        state.calls.list_histories += 1;
        if let Some(err) = state.read_error.clone() {
            return Err(err);
        }
        Ok(state
            .histories
            .iter()
            .filter(|record| &record.person_dni == dni)
            .cloned()
            .collect())
    }

    fn list_clinics(&self) -> Result<Vec<Clinic>, StoreError> {
        Ok(Vec::new())
    }

    fn list_specialties(&self, _clinic_id: &str) -> Result<Vec<Specialty>, StoreError> {
        Ok(Vec::new())
    }

    fn list_medications(&self, _clinic_id: &str) -> Result<Vec<ClinicMedication>, StoreError> {
        Ok(Vec::new())
    }
}

pub struct FakeModel {
    reply: Result<ModelResponse, ProviderError>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl FakeModel {
    pub fn replying(reply: Result<ModelResponse, ProviderError>) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self::replying(Ok(ModelResponse::from_text(text)))
    }

    pub fn with_report(report: Value) -> Self {
        Self::with_text(report.to_string())
    }

    pub fn calls(&self) -> usize {
        self.requests().len()
    }

    pub fn last_request(&self) -> Option<ModelRequest> {
        self.requests().last().cloned()
    }

    fn requests(&self) -> MutexGuard<'_, Vec<ModelRequest>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ModelProvider for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.requests().push(request.clone());
        self.reply.clone()
    }
}

pub fn report_json() -> Value {
    json!({
        "contexto_valido": true,
        "mensaje_contexto": "",
        "analisis_visual_resumen": "Red, scaly patches on the left flank.",
        "lista_hallazgos": [
            {"hallazgo": "Erythema", "confianza_visual_porcentaje": 80, "imagen_relevante": 1}
        ],
        "diagnostico_sugerido": {
            "enfermedad_probable": "Allergic dermatitis",
            "confianza_diagnostico_porcentaje": 65,
            "recomendacion_accion": "Book a dermatology visit this week."
        },
        "recomendaciones": {
            "clinica_recomendada": {"nombre": "Vet Central", "razon": "Has a dermatology unit."},
            "especialidad_requerida": "Dermatology",
            "medicamentos_recomendados": [{
                "nombre": "Apoquel",
                "descripcion": "Itch relief",
                "disponible_en_tienda": true,
                "nombre_tienda": "Vet Central",
                "precio": 12.5
            }]
        },
        "advertencia_legal": "This is not a substitute for a veterinary visit."
    })
}

pub fn history_record(code: &str, dni: &Dni, gemini_response: &str) -> HistoryRecord {
    HistoryRecord {
        code: code.to_string(),
        person_dni: dni.clone(),
        animal_name: "Rex".to_string(),
        gender_of_animal: Gender::Male.code(),
        average_weight: 10.0,
        average_age: 2.0,
        gemini_response: gemini_response.to_string(),
        created_on: "2024-05-01T10:00:00Z".to_string(),
    }
}

pub fn rex() -> PetProfile {
    PetProfile {
        owner_dni: "12345678".to_string(),
        animal_name: "Rex".to_string(),
        gender: Some(Gender::Male),
        weight: "10".to_string(),
        age: "2".to_string(),
        language: Language::Spanish,
    }
}

pub fn photo() -> ImageSource {
    ImageSource::DataUri("data:image/jpeg;base64,/9j/4AAQSkZJRg==".to_string())
}
