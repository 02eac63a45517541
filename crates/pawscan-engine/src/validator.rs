use pawscan_contracts::diagnosis::{DiagnosticReport, LEGACY_REPORT_KEYS, REQUIRED_REPORT_KEYS};
use pawscan_contracts::error::{truncate_chars, AnalysisError, RAW_EXCERPT_CHARS};
use pawscan_contracts::records::StoredAnalysis;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `generateContent` response body, reduced to what the validator reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl ModelResponse {
    /// A single candidate carrying one text part.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(CandidateContent {
                    parts: vec![ResponsePart {
                        text: Some(text.into()),
                    }],
                }),
                finish_reason: Some("STOP".to_string()),
            }],
            usage_metadata: None,
        }
    }
}

/// Text of the first part of the first candidate. Only absent or empty text
/// is malformed; anything else goes to the JSON parser.
pub fn extract_text(response: &ModelResponse) -> Result<&str, AnalysisError> {
    let candidate = response
        .candidates
        .first()
        .ok_or(AnalysisError::EmptyApiResponse)?;
    let part = candidate
        .content
        .as_ref()
        .and_then(|content| content.parts.first())
        .ok_or(AnalysisError::MalformedContent)?;
    match part.text.as_deref() {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(AnalysisError::MalformedContent),
    }
}

/// Parses model text into a report. Pure: the same input always gives the
/// same result.
pub fn parse_report(raw: &str) -> Result<DiagnosticReport, AnalysisError> {
    let value = parse_json(raw)?;
    let Some(object) = value.as_object() else {
        return Err(AnalysisError::SchemaMismatch {
            missing: required_keys(),
            detail: "expected a JSON object".to_string(),
        });
    };
    let missing = missing_keys(object, REQUIRED_REPORT_KEYS);
    if !missing.is_empty() {
        return Err(AnalysisError::SchemaMismatch {
            detail: format!("missing required fields: {}", missing.join(", ")),
            missing,
        });
    }
    serde_json::from_value(value).map_err(|err| AnalysisError::SchemaMismatch {
        missing: Vec::new(),
        detail: err.to_string(),
    })
}

pub fn validate_response(response: &ModelResponse) -> Result<DiagnosticReport, AnalysisError> {
    parse_report(extract_text(response)?)
}

/// Decodes a stored `gemini_response`. Only the JSON step is mandatory;
/// schema checks decide between the current and legacy shapes.
pub fn parse_stored(raw: &str) -> Result<StoredAnalysis, AnalysisError> {
    let value = parse_json(raw)?;
    let Value::Object(object) = value else {
        return Err(AnalysisError::SchemaMismatch {
            missing: required_keys(),
            detail: "expected a JSON object".to_string(),
        });
    };
    if missing_keys(&object, REQUIRED_REPORT_KEYS).is_empty() {
        let report = serde_json::from_value(Value::Object(object)).map_err(|err| {
            AnalysisError::SchemaMismatch {
                missing: Vec::new(),
                detail: err.to_string(),
            }
        })?;
        return Ok(StoredAnalysis::Current(Box::new(report)));
    }
    let legacy_missing = missing_keys(&object, LEGACY_REPORT_KEYS);
    if legacy_missing.is_empty() {
        return Ok(StoredAnalysis::Legacy(object));
    }
    Err(AnalysisError::SchemaMismatch {
        detail: format!("missing required fields: {}", legacy_missing.join(", ")),
        missing: legacy_missing,
    })
}

fn parse_json(raw: &str) -> Result<Value, AnalysisError> {
    serde_json::from_str(raw).map_err(|err| AnalysisError::InvalidJson {
        message: err.to_string(),
        raw_excerpt: truncate_chars(raw, RAW_EXCERPT_CHARS),
    })
}

fn missing_keys(object: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter(|key| !object.contains_key(**key))
        .map(|key| (*key).to_string())
        .collect()
}

fn required_keys() -> Vec<String> {
    REQUIRED_REPORT_KEYS
        .iter()
        .map(|key| (*key).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn report_json() -> Value {
        json!({
            "contexto_valido": true,
            "mensaje_contexto": "",
            "analisis_visual_resumen": "Red patches on the flank.",
            "lista_hallazgos": [
                {"hallazgo": "Erythema", "confianza_visual_porcentaje": 80, "imagen_relevante": 1}
            ],
            "diagnostico_sugerido": {
                "enfermedad_probable": "Allergic dermatitis",
                "confianza_diagnostico_porcentaje": 65,
                "recomendacion_accion": "Visit a vet within the week."
            },
            "recomendaciones": {
                "clinica_recomendada": {"nombre": "Vet Central", "razon": "Dermatology unit"},
                "especialidad_requerida": "Dermatology",
                "medicamentos_recomendados": []
            },
            "advertencia_legal": "Not a substitute for a veterinary visit."
        })
    }

    #[test]
    fn empty_candidates_and_missing_text_are_distinct() {
        assert_eq!(
            validate_response(&ModelResponse::default()),
            Err(AnalysisError::EmptyApiResponse)
        );
        let no_parts = ModelResponse {
            candidates: vec![Candidate {
                content: Some(CandidateContent { parts: Vec::new() }),
                finish_reason: None,
            }],
            usage_metadata: None,
        };
        assert_eq!(validate_response(&no_parts), Err(AnalysisError::MalformedContent));
        let no_content = ModelResponse {
            candidates: vec![Candidate::default()],
            usage_metadata: None,
        };
        assert_eq!(validate_response(&no_content), Err(AnalysisError::MalformedContent));
        assert_eq!(
            validate_response(&ModelResponse::from_text("")),
            Err(AnalysisError::MalformedContent)
        );
    }

    #[test]
    fn whitespace_text_is_invalid_json() {
        let err = validate_response(&ModelResponse::from_text(" \n "));
        let Err(AnalysisError::InvalidJson { raw_excerpt, .. }) = err else {
            panic!("expected InvalidJson");
        };
        assert_eq!(raw_excerpt, " \n ");
    }

    #[test]
    fn invalid_json_carries_a_bounded_excerpt() {
        let raw = format!("Sure! Here is the analysis: {}", "x".repeat(800));
        let Err(AnalysisError::InvalidJson {
            message,
            raw_excerpt,
        }) = parse_report(&raw)
        else {
            panic!("expected InvalidJson");
        };
        assert!(!message.is_empty());
        assert_eq!(raw_excerpt.chars().count(), RAW_EXCERPT_CHARS);
        assert!(raw.starts_with(&raw_excerpt));
    }

    #[test]
    fn missing_fields_are_listed() {
        let mut value = report_json();
        if let Some(object) = value.as_object_mut() {
            object.remove("advertencia_legal");
            object.remove("lista_hallazgos");
        }
        let err = parse_report(&value.to_string());
        assert_eq!(
            err,
            Err(AnalysisError::SchemaMismatch {
                missing: vec!["lista_hallazgos".to_string(), "advertencia_legal".to_string()],
                detail: "missing required fields: lista_hallazgos, advertencia_legal".to_string(),
            })
        );
        assert!(matches!(
            parse_report("[1, 2]"),
            Err(AnalysisError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn wrongly_typed_fields_are_a_schema_mismatch() {
        let mut value = report_json();
        value["diagnostico_sugerido"] = json!("Allergic dermatitis");
        let Err(AnalysisError::SchemaMismatch { missing, detail }) =
            parse_report(&value.to_string())
        else {
            panic!("expected SchemaMismatch");
        };
        assert!(missing.is_empty());
        assert!(!detail.is_empty());
    }

    #[test]
    fn validation_is_idempotent() {
        let response = ModelResponse::from_text(report_json().to_string());
        let first = validate_response(&response);
        let second = validate_response(&response);
        assert!(first.is_ok());
        assert_eq!(first, second);

        let broken = ModelResponse::from_text("{not json");
        assert_eq!(validate_response(&broken), validate_response(&broken));
    }

    #[test]
    fn report_is_returned_verbatim() {
        let report = parse_report(&report_json().to_string()).unwrap();
        assert!(report.context_valid);
        assert_eq!(report.findings[0].relevant_image_index, Some(1));
        assert_eq!(report.findings[0].confidence_percent, 80.0);
        assert_eq!(report.recommendations.required_specialty, "Dermatology");
    }

    #[test]
    fn stored_analysis_distinguishes_legacy_records() {
        let current = parse_stored(&report_json().to_string());
        assert!(matches!(current, Ok(StoredAnalysis::Current(_))));

        let legacy = json!({
            "analisis_visual_resumen": "old",
            "lista_hallazgos": [],
            "diagnostico_sugerido": {"enfermedad_probable": "x"},
            "advertencia_legal": "old disclaimer"
        });
        assert!(matches!(
            parse_stored(&legacy.to_string()),
            Ok(StoredAnalysis::Legacy(_))
        ));

        assert!(matches!(
            parse_stored("{\"foo\": 1}"),
            Err(AnalysisError::SchemaMismatch { .. })
        ));
        assert!(matches!(
            parse_stored("not json"),
            Err(AnalysisError::InvalidJson { .. })
        ));
    }
}
