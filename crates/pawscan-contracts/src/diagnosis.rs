//! Structured diagnostic opinion returned by the vision model.
//!
//! Field names are English; the JSON keys are the ones the model is asked to
//! produce and the record store persists, so they are kept stable via
//! `#[serde(rename)]`.

use serde::{Deserialize, Serialize};

/// Top-level keys every canonical report must carry.
pub const REQUIRED_REPORT_KEYS: &[&str] = &[
    "contexto_valido",
    "mensaje_contexto",
    "analisis_visual_resumen",
    "lista_hallazgos",
    "diagnostico_sugerido",
    "recomendaciones",
    "advertencia_legal",
];

/// Keys present in reports written before context validity and
/// recommendations were added to the schema.
pub const LEGACY_REPORT_KEYS: &[&str] = &[
    "analisis_visual_resumen",
    "lista_hallazgos",
    "diagnostico_sugerido",
    "advertencia_legal",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    #[serde(rename = "contexto_valido")]
    pub context_valid: bool,
    #[serde(rename = "mensaje_contexto")]
    pub context_message: String,
    #[serde(rename = "analisis_visual_resumen")]
    pub visual_summary: String,
    #[serde(rename = "lista_hallazgos")]
    pub findings: Vec<Finding>,
    #[serde(rename = "diagnostico_sugerido")]
    pub diagnosis: Diagnosis,
    #[serde(rename = "recomendaciones")]
    pub recommendations: Recommendations,
    #[serde(rename = "advertencia_legal")]
    pub legal_disclaimer: String,
    #[serde(
        rename = "codigo_consulta",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub consultation_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "hallazgo")]
    pub description: String,
    #[serde(rename = "confianza_visual_porcentaje")]
    pub confidence_percent: f64,
    /// 1-based index into the submitted images.
    #[serde(
        rename = "imagen_relevante",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relevant_image_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    #[serde(rename = "enfermedad_probable")]
    pub probable_condition: String,
    #[serde(rename = "confianza_diagnostico_porcentaje")]
    pub confidence_percent: f64,
    #[serde(rename = "recomendacion_accion")]
    pub recommended_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    #[serde(rename = "clinica_recomendada")]
    pub recommended_clinic: ClinicRecommendation,
    #[serde(rename = "especialidad_requerida")]
    pub required_specialty: String,
    #[serde(rename = "medicamentos_recomendados", default)]
    pub recommended_medications: Vec<MedicationSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicRecommendation {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "razon")]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationSuggestion {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "disponible_en_tienda")]
    pub available_in_store: bool,
    #[serde(
        rename = "nombre_tienda",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub store_name: Option<String>,
    #[serde(rename = "precio", default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl DiagnosticReport {
    /// Findings whose image index points outside `image_count` submitted
    /// images. Reported, never corrected.
    pub fn findings_with_unknown_image(&self, image_count: usize) -> Vec<&Finding> {
        self.findings
            .iter()
            .filter(|finding| {
                finding
                    .relevant_image_index
                    .map(|index| index == 0 || index as usize > image_count)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Suggested medications whose store details disagree with their
    /// availability. Reported, never corrected.
    pub fn medications_with_inconsistent_store(&self) -> Vec<&MedicationSuggestion> {
        self.recommendations
            .recommended_medications
            .iter()
            .filter(|medication| !medication.store_details_consistent())
            .collect()
    }
}

impl MedicationSuggestion {
    /// Store details are expected exactly when the medication is in stock.
    pub fn store_details_consistent(&self) -> bool {
        let has_details = self.store_name.is_some() && self.price.is_some();
        let has_none = self.store_name.is_none() && self.price.is_none();
        if self.available_in_store {
            has_details
        } else {
            has_none
        }
    }
}
