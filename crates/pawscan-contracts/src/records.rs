use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diagnosis::DiagnosticReport;
use crate::pet::{Dni, Gender, ValidatedPet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub dni: Dni,
    pub name: String,
}

/// Body of a history creation request. Built once per context-valid
/// analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDraft {
    pub person_dni: Dni,
    pub animal_name: String,
    pub gender_of_animal: u8,
    pub average_weight: f64,
    pub average_age: f64,
    /// JSON-encoded [`DiagnosticReport`].
    pub gemini_response: String,
}

impl HistoryDraft {
    pub fn new(pet: &ValidatedPet, report: &DiagnosticReport) -> serde_json::Result<Self> {
        Ok(Self {
            person_dni: pet.owner_dni.clone(),
            animal_name: pet.animal_name.clone(),
            gender_of_animal: pet.gender.code(),
            average_weight: pet.weight,
            average_age: pet.age,
            gemini_response: serde_json::to_string(report)?,
        })
    }
}

/// Persisted history entry as returned by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub code: String,
    pub person_dni: Dni,
    pub animal_name: String,
    pub gender_of_animal: u8,
    pub average_weight: f64,
    pub average_age: f64,
    pub gemini_response: String,
    #[serde(default)]
    pub created_on: String,
}

impl HistoryRecord {
    pub fn gender(&self) -> Option<Gender> {
        Gender::from_code(self.gender_of_animal)
    }
}

/// What the store echoes back after creating a history entry. The code is
/// optional here because its absence is an integration failure the caller
/// must detect.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedHistory {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub created_on: Option<String>,
}

/// Parsed `gemini_response` of a stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredAnalysis {
    Current(Box<DiagnosticReport>),
    /// Written with the older schema (no context validity, no
    /// recommendations). Kept as the raw object.
    Legacy(Map<String, Value>),
}

impl StoredAnalysis {
    pub fn report(&self) -> Option<&DiagnosticReport> {
        match self {
            StoredAnalysis::Current(report) => Some(report),
            StoredAnalysis::Legacy(_) => None,
        }
    }
}

/// A history record together with its decoded analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub record: HistoryRecord,
    pub analysis: StoredAnalysis,
}

/// Navigation target emitted when a submission completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consultation {
    pub code: String,
    pub owner_dni: Dni,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specialty {
    pub id: String,
    #[serde(default)]
    pub stores_id: String,
    pub specialty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicMedication {
    pub id: String,
    #[serde(default)]
    pub stores_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
}
