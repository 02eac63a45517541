use std::collections::BTreeMap;
use std::error::Error as _;
use std::time::Duration;

use pawscan_contracts::error::{truncate_chars, ProviderError, SelectionError};
use pawscan_contracts::models::ModelSelection;
use pawscan_contracts::pet::Language;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::prompt::{language_directive, ContentPart};
use crate::validator::ModelResponse;

const ERROR_BODY_CHARS: usize = 512;

/// Multi-part input for one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub system_instruction: String,
    pub parts: Vec<ContentPart>,
    pub response_schema: Value,
    pub language: Language,
}

pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;
    /// One attempt, no retries.
    fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError>;
}

#[derive(Default)]
pub struct ModelProviderRegistry {
    providers: BTreeMap<String, Box<dyn ModelProvider>>,
}

impl ModelProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ModelProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ModelProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// The provider that serves a selected model.
    pub fn for_selection(
        &self,
        selection: &ModelSelection,
    ) -> Result<&dyn ModelProvider, SelectionError> {
        self.get(&selection.model.provider)
            .ok_or_else(|| SelectionError::ProviderMissing {
                model: selection.model.name.clone(),
                provider: selection.model.provider.clone(),
                available: self.names().join(", "),
            })
    }
}

pub fn default_provider_registry(config: &EngineConfig) -> ModelProviderRegistry {
    let mut providers = ModelProviderRegistry::new();
    providers.register(DryrunProvider);
    providers.register(GeminiProvider::new(config));
    providers
}

/// Offline provider that answers every request with the same well-formed
/// report, pointing one finding at each submitted image.
pub struct DryrunProvider;

impl ModelProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let image_count = request
            .parts
            .iter()
            .filter(|part| matches!(part, ContentPart::InlineData(_)))
            .count();
        let findings: Vec<Value> = (1..=image_count)
            .map(|index| {
                json!({
                    "hallazgo": format!("Dry-run observation for image {index}"),
                    "confianza_visual_porcentaje": 50,
                    "imagen_relevante": index,
                })
            })
            .collect();
        let context_message = if image_count > 0 {
            ""
        } else {
            "No images were provided."
        };
        let report = json!({
            "contexto_valido": image_count > 0,
            "mensaje_contexto": context_message,
            "analisis_visual_resumen": format!(
                "Dry-run analysis of {image_count} image(s) in {}.",
                request.language.label()
            ),
            "lista_hallazgos": findings,
            "diagnostico_sugerido": {
                "enfermedad_probable": "Undetermined (dry run)",
                "confianza_diagnostico_porcentaje": 0,
                "recomendacion_accion": "Consult a veterinarian."
            },
            "recomendaciones": {
                "clinica_recomendada": {
                    "nombre": "Nearest clinic",
                    "razon": "Dry-run placeholder."
                },
                "especialidad_requerida": "General medicine",
                "medicamentos_recomendados": []
            },
            "advertencia_legal": "This dry-run output is not veterinary advice."
        });
        Ok(ModelResponse::from_text(report.to_string()))
    }
}

pub struct GeminiProvider {
    api_base: String,
    api_key: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            api_base: config.gemini_api_base.trim_end_matches('/').to_string(),
            api_key: config.gemini_api_key.clone(),
            timeout: config.request_timeout,
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl ModelProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::MissingCredentials(
                "GEMINI_API_KEY or GOOGLE_API_KEY or GEMINI_TOKEN not set".to_string(),
            )
        })?;
        let response = self
            .http
            .post(self.endpoint_for_model(&request.model))
            .query(&[("key", api_key)])
            .timeout(self.timeout)
            .json(&gemini_payload(request))
            .send()
            .map_err(|err| ProviderError::Transport(reqwest_error_text(&err)))?;
        let body = response_text_or_error(response)?;
        serde_json::from_str(&body).map_err(|err| {
            ProviderError::InvalidPayload(format!("gemini returned invalid JSON payload: {err}"))
        })
    }
}

/// `generateContent` body: system instruction with the language directive,
/// a single user turn, and a JSON-constrained generation config.
pub fn gemini_payload(request: &ModelRequest) -> Value {
    json!({
        "systemInstruction": {
            "parts": [{
                "text": format!(
                    "{}\n\n{}",
                    request.system_instruction,
                    language_directive(request.language)
                )
            }]
        },
        "contents": [{
            "role": "user",
            "parts": request.parts,
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.response_schema,
        }
    })
}

fn response_text_or_error(response: HttpResponse) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().map_err(|err| {
        ProviderError::Transport(format!(
            "gemini response body read failed: {}",
            reqwest_error_text(&err)
        ))
    })?;
    if !status.is_success() {
        return Err(ProviderError::Http {
            status: status.as_u16(),
            body: truncate_chars(&body, ERROR_BODY_CHARS),
        });
    }
    Ok(body)
}

pub(crate) fn reqwest_error_text(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if parts.last() != Some(&text) && !text.trim().is_empty() {
            parts.push(text);
        }
        source = cause.source();
    }
    truncate_chars(&parts.join(" | caused by: "), ERROR_BODY_CHARS)
}
