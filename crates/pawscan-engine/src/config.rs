use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_HOME: &str = ".pawscan";
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;
const MIN_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub api_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub model: Option<String>,
    pub request_timeout: Duration,
    pub home: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            gemini_api_key: None,
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            model: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            home: PathBuf::from(DEFAULT_HOME),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    /// Builds a config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            api_url: get("PAWSCAN_API_URL")
                .or_else(|| get("API_URL"))
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            gemini_api_key: get("GEMINI_API_KEY")
                .or_else(|| get("GOOGLE_API_KEY"))
                .or_else(|| get("GEMINI_TOKEN")),
            gemini_api_base: get("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_api_base),
            model: get("PAWSCAN_MODEL"),
            request_timeout: get("PAWSCAN_REQUEST_TIMEOUT")
                .and_then(|value| value.parse::<u64>().ok())
                .map(clamp_timeout)
                .unwrap_or(defaults.request_timeout),
            home: get("PAWSCAN_HOME")
                .map(PathBuf::from)
                .unwrap_or(defaults.home),
        }
    }

    pub fn events_path(&self) -> PathBuf {
        self.home.join("events.jsonl")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.home.join("consultations.json")
    }
}

pub fn clamp_timeout(seconds: u64) -> Duration {
    Duration::from_secs(seconds.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
