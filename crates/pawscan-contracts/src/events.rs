//! Append-only `events.jsonl` log of submission attempts.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Written in place of inline image data.
pub const IMAGE_PLACEHOLDER: &str = "[image omitted]";

/// Append-only writer for `events.jsonl`.
///
/// - default fields are `type`, `session_id`, `ts`, plus `submission_id`
///   on a writer scoped with [`EventWriter::for_submission`]
/// - caller payload is merged last and can override defaults
/// - data URIs and `inlineData` parts never reach the file
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
    submission_id: Option<String>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
            submission_id: None,
        }
    }

    /// Same log and session, with every event tagged by `submission_id`.
    pub fn for_submission(&self, submission_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            submission_id: Some(submission_id.into()),
        }
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        if let Some(submission_id) = &self.submission_id {
            event.insert(
                "submission_id".to_string(),
                Value::String(submission_id.clone()),
            );
        }
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, mut value) in payload {
            redact_images(&mut value);
            event.insert(key, value);
        }

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

fn redact_images(value: &mut Value) {
    match value {
        Value::String(text) if text.starts_with("data:") && text.contains(";base64,") => {
            *text = IMAGE_PLACEHOLDER.to_string();
        }
        Value::Array(items) => items.iter_mut().for_each(redact_images),
        Value::Object(fields) => {
            for (key, field) in fields.iter_mut() {
                if key == "inlineData" {
                    *field = Value::String(IMAGE_PLACEHOLDER.to_string());
                } else {
                    redact_images(field);
                }
            }
        }
        _ => {}
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        let mut payload = EventPayload::new();
        payload.insert("images".to_string(), Value::from(2));
        let emitted = writer.emit("submission_started", payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::from("submission_started"));
        assert_eq!(parsed["session_id"], Value::from("session-123"));
        assert_eq!(parsed["images"], Value::from(2));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn payload_can_override_default_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        let mut payload = EventPayload::new();
        payload.insert("type".to_string(), Value::from("override"));
        payload.insert("session_id".to_string(), Value::from("other"));
        let emitted = writer.emit("state_changed", payload)?;

        assert_eq!(emitted["type"], Value::from("override"));
        assert_eq!(emitted["session_id"], Value::from("other"));
        Ok(())
    }

    #[test]
    fn scoped_writer_tags_events_with_the_submission() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");
        let attempt = writer.for_submission("attempt-1");

        let untagged = writer.emit("one", EventPayload::new())?;
        let tagged = attempt.emit("two", EventPayload::new())?;

        assert!(untagged.get("submission_id").is_none());
        assert_eq!(tagged["submission_id"], Value::from("attempt-1"));
        assert_eq!(tagged["session_id"], Value::from("session-123"));
        assert_eq!(fs::read_to_string(&path)?.lines().count(), 2);
        Ok(())
    }

    #[test]
    fn inline_images_never_reach_the_log() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        let mut payload = EventPayload::new();
        payload.insert(
            "images".to_string(),
            serde_json::json!(["data:image/png;base64,iVBORw0KGgo=", "photo.jpg"]),
        );
        payload.insert(
            "part".to_string(),
            serde_json::json!({"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}),
        );
        writer.emit("submission_started", payload)?;

        let content = fs::read_to_string(&path)?;
        assert!(!content.contains("iVBORw0KGgo"));
        let parsed: Value = serde_json::from_str(content.trim())?;
        assert_eq!(parsed["images"][0], Value::from(IMAGE_PLACEHOLDER));
        assert_eq!(parsed["images"][1], Value::from("photo.jpg"));
        assert_eq!(parsed["part"]["inlineData"], Value::from(IMAGE_PLACEHOLDER));
        Ok(())
    }

    #[test]
    fn emit_appends_lines_and_creates_parent_dir() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        writer.emit("one", EventPayload::new())?;
        writer.emit("two", EventPayload::new())?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0])?;
        let second: Value = serde_json::from_str(lines[1])?;
        assert_eq!(first["type"], Value::from("one"));
        assert_eq!(second["type"], Value::from("two"));
        Ok(())
    }
}
