use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

use crate::diagnosis::DiagnosticReport;

/// Local display cache of the last viewed report per consultation code.
///
/// Never authoritative: lookups always go to the record store, this only
/// lets a caller redisplay something it has already fetched.
#[derive(Debug, Clone)]
pub struct ConsultationCache {
    path: PathBuf,
    payload: Option<Map<String, Value>>,
    dirty_keys: Vec<String>,
}

impl ConsultationCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            payload: None,
            dirty_keys: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries that no longer decode as a report are treated as absent.
    pub fn get(&mut self, code: &str) -> Option<DiagnosticReport> {
        let payload = self.reload();
        payload
            .get(code)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn codes(&mut self) -> Vec<String> {
        self.reload().keys().cloned().collect()
    }

    pub fn set(&mut self, code: &str, report: &DiagnosticReport) -> anyhow::Result<()> {
        let snapshot = serde_json::to_value(report)?;
        let payload = self.reload();
        if payload.get(code) == Some(&snapshot) {
            return Ok(());
        }
        payload.insert(code.to_string(), snapshot);
        if !self.dirty_keys.iter().any(|key| key == code) {
            self.dirty_keys.push(code.to_string());
        }
        self.flush()
    }

    /// Writes only the keys this instance touched, on top of whatever is on
    /// disk now.
    pub fn flush(&mut self) -> anyhow::Result<()> {
        if self.dirty_keys.is_empty() {
            return Ok(());
        }
        let Some(payload) = &self.payload else {
            return Ok(());
        };

        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        for key in &self.dirty_keys {
            if let Some(value) = payload.get(key) {
                on_disk.insert(key.clone(), value.clone());
            }
        }
        write_json_object(&self.path, &on_disk)?;
        self.payload = Some(on_disk);
        self.dirty_keys.clear();
        Ok(())
    }

    fn reload(&mut self) -> &mut Map<String, Value> {
        let fresh = read_json_object(&self.path).unwrap_or_default();
        self.payload.insert(fresh)
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed.as_object().cloned()
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )
    .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
