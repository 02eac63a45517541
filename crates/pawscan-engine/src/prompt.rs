use pawscan_contracts::error::BuildError;
use pawscan_contracts::images::ImagePayload;
use pawscan_contracts::pet::{Language, PetProfile};
use serde::Serialize;
use serde_json::{json, Value};

pub const SYSTEM_INSTRUCTION: &str = "You are a veterinary triage assistant. You look at photos of a \
pet together with the owner's description and produce a preliminary, non-binding assessment. \
First decide whether the photos and description actually concern an animal's health; if they do \
not, set contexto_valido to false and explain why in mensaje_contexto. Never present the \
assessment as a definitive diagnosis and always include a legal disclaimer advising an in-person \
visit to a veterinarian.";

const ANALYSIS_INSTRUCTION: &str = "Analyse the attached images. Identify any visible symptom, \
anomaly or sign of disease in the animal. Using the visual analysis, the owner's description and \
the pet details, give a complete veterinary assessment. Refer to images by their 1-based position \
in this message when filling imagen_relevante.";

/// One segment of the multi-part model input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "inlineData")]
    InlineData(ImagePayload),
}

/// Everything one submission sends to the model. Built fresh per attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    description: String,
    images: Vec<ImagePayload>,
    pet: PetProfile,
    language: Language,
}

impl AnalysisRequest {
    pub fn new(
        description: &str,
        images: Vec<ImagePayload>,
        pet: PetProfile,
        language: Language,
    ) -> Result<Self, BuildError> {
        if images.is_empty() {
            return Err(BuildError::EmptyImageSet);
        }
        if description.trim().is_empty() {
            return Err(BuildError::EmptyDescription);
        }
        Ok(Self {
            description: description.trim().to_string(),
            images,
            pet,
            language,
        })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Instruction first, then every image in upload order, then the
    /// description with the pet addendum.
    pub fn parts(&self) -> Vec<ContentPart> {
        let mut parts = Vec::with_capacity(self.images.len() + 2);
        parts.push(ContentPart::Text(format!(
            "{ANALYSIS_INSTRUCTION}\n\n{}",
            language_directive(self.language)
        )));
        parts.extend(self.images.iter().cloned().map(ContentPart::InlineData));
        parts.push(ContentPart::Text(format!(
            "User description: {}{}",
            self.description,
            pet_addendum(&self.pet)
        )));
        parts
    }
}

pub fn language_directive(language: Language) -> String {
    format!(
        "Write every free-text field of the response in {}. Keep the JSON keys exactly as defined by the schema.",
        language.label()
    )
}

/// Labelled block of the non-empty pet fields. The owner's DNI is never
/// sent to the model.
pub fn pet_addendum(pet: &PetProfile) -> String {
    let mut lines = Vec::new();
    let name = pet.animal_name.trim();
    if !name.is_empty() {
        lines.push(format!("- Name: {name}"));
    }
    if let Some(gender) = pet.gender {
        lines.push(format!("- Gender: {}", gender.label()));
    }
    let weight = pet.weight.trim();
    if !weight.is_empty() {
        lines.push(format!("- Weight: {weight} kg"));
    }
    let age = pet.age.trim();
    if !age.is_empty() {
        lines.push(format!("- Age: {age} years"));
    }
    if lines.is_empty() {
        return String::new();
    }
    format!("\n\nAdditional pet details:\n{}", lines.join("\n"))
}

/// Schema handed to the model as `generationConfig.responseSchema`.
pub fn response_schema() -> Value {
    let text = json!({ "type": "STRING" });
    let percent = json!({ "type": "NUMBER" });
    json!({
        "type": "OBJECT",
        "properties": {
            "contexto_valido": { "type": "BOOLEAN" },
            "mensaje_contexto": text,
            "analisis_visual_resumen": text,
            "lista_hallazgos": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "hallazgo": text,
                        "confianza_visual_porcentaje": percent,
                        "imagen_relevante": { "type": "INTEGER" }
                    },
                    "required": ["hallazgo", "confianza_visual_porcentaje"]
                }
            },
            "diagnostico_sugerido": {
                "type": "OBJECT",
                "properties": {
                    "enfermedad_probable": text,
                    "confianza_diagnostico_porcentaje": percent,
                    "recomendacion_accion": text
                },
                "required": [
                    "enfermedad_probable",
                    "confianza_diagnostico_porcentaje",
                    "recomendacion_accion"
                ]
            },
            "recomendaciones": {
                "type": "OBJECT",
                "properties": {
                    "clinica_recomendada": {
                        "type": "OBJECT",
                        "properties": { "nombre": text, "razon": text },
                        "required": ["nombre", "razon"]
                    },
                    "especialidad_requerida": text,
                    "medicamentos_recomendados": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "nombre": text,
                                "descripcion": text,
                                "disponible_en_tienda": { "type": "BOOLEAN" },
                                "nombre_tienda": text,
                                "precio": percent
                            },
                            "required": ["nombre", "descripcion", "disponible_en_tienda"]
                        }
                    }
                },
                "required": [
                    "clinica_recomendada",
                    "especialidad_requerida",
                    "medicamentos_recomendados"
                ]
            },
            "advertencia_legal": text
        },
        "required": pawscan_contracts::diagnosis::REQUIRED_REPORT_KEYS
    })
}
