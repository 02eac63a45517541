use pawscan_contracts::error::{AnalysisError, LookupError, StoreError};
use pawscan_contracts::pet::Dni;
use pawscan_contracts::records::{HistoryEntry, HistoryRecord, StoredAnalysis};

use crate::store::RecordStore;
use crate::validator::parse_stored;

/// Read side of the history store. Every stored analysis is re-parsed on
/// the way out; nothing is cached here.
pub struct HistoryLookup<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> HistoryLookup<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub fn fetch(&self, code: &str, owner_dni: &Dni) -> Result<HistoryEntry, LookupError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(LookupError::NotFound("consultation code is blank".to_string()));
        }
        let record = self
            .store
            .get_history(code, owner_dni)
            .map_err(not_found_or_remote)?;
        decode_entry(record)
    }

    /// One corrupt record fails the whole listing.
    pub fn fetch_for_owner(&self, owner_dni: &Dni) -> Result<Vec<HistoryEntry>, LookupError> {
        self.store
            .list_histories(owner_dni)
            .map_err(not_found_or_remote)?
            .into_iter()
            .map(decode_entry)
            .collect()
    }
}

pub fn decode_entry(record: HistoryRecord) -> Result<HistoryEntry, LookupError> {
    let analysis = decode_analysis(&record.code, &record.gemini_response)?;
    Ok(HistoryEntry { record, analysis })
}

pub fn decode_analysis(code: &str, raw: &str) -> Result<StoredAnalysis, LookupError> {
    parse_stored(raw).map_err(|err| LookupError::CorruptRecord {
        code: code.to_string(),
        detail: match err {
            AnalysisError::InvalidJson { message, .. } => message,
            other => other.to_string(),
        },
    })
}

/// Only an explicit rejection means the record does not exist. An
/// unavailable store stays a remote failure.
fn not_found_or_remote(err: StoreError) -> LookupError {
    match err {
        StoreError::Rejected(message) => LookupError::NotFound(message),
        other => LookupError::Remote(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{history_record, report_json, FakeStore};

    fn owner() -> Dni {
        Dni::parse("12345678").unwrap()
    }

    #[test]
    fn fetch_decodes_current_reports() -> Result<(), LookupError> {
        let store = FakeStore::default();
        store.insert_history(history_record("H-1", &owner(), &report_json().to_string()));
        let entry = HistoryLookup::new(&store).fetch(" H-1 ", &owner())?;
        assert_eq!(entry.record.code, "H-1");
        let report = entry.analysis.report().map(|report| report.context_valid);
        assert_eq!(report, Some(true));
        Ok(())
    }

    #[test]
    fn unknown_code_is_not_found() {
        let store = FakeStore::default();
        let err = HistoryLookup::new(&store).fetch("H-404", &owner());
        assert!(matches!(err, Err(LookupError::NotFound(_))));
        assert!(matches!(
            HistoryLookup::new(&store).fetch("  ", &owner()),
            Err(LookupError::NotFound(_))
        ));
    }

    #[test]
    fn other_owners_cannot_read_a_record() {
        let store = FakeStore::default();
        store.insert_history(history_record("H-1", &owner(), &report_json().to_string()));
        let stranger = Dni::parse("87654321").unwrap();
        let err = HistoryLookup::new(&store).fetch("H-1", &stranger);
        assert!(matches!(err, Err(LookupError::NotFound(_))));
    }

    #[test]
    fn corrupt_payload_is_surfaced_with_its_code() {
        let store = FakeStore::default();
        store.insert_history(history_record("H-2", &owner(), "{truncated"));
        let err = HistoryLookup::new(&store).fetch("H-2", &owner());
        let Err(LookupError::CorruptRecord { code, detail }) = err else {
            panic!("expected CorruptRecord");
        };
        assert_eq!(code, "H-2");
        assert!(!detail.is_empty());
    }

    #[test]
    fn legacy_records_are_listed_alongside_current_ones() -> Result<(), LookupError> {
        let store = FakeStore::default();
        store.insert_history(history_record("H-1", &owner(), &report_json().to_string()));
        let legacy = serde_json::json!({
            "analisis_visual_resumen": "old format",
            "lista_hallazgos": [],
            "diagnostico_sugerido": {"enfermedad_probable": "otitis"},
            "advertencia_legal": "old disclaimer"
        });
        store.insert_history(history_record("H-0", &owner(), &legacy.to_string()));
        let entries = HistoryLookup::new(&store).fetch_for_owner(&owner())?;
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .any(|entry| matches!(entry.analysis, StoredAnalysis::Legacy(_))));
        Ok(())
    }

    #[test]
    fn transport_failures_stay_remote_errors() {
        let store = FakeStore::default();
        store.fail_reads(StoreError::Transport("connection refused".to_string()));
        let err = HistoryLookup::new(&store).fetch_for_owner(&owner());
        assert_eq!(
            err,
            Err(LookupError::Remote(StoreError::Transport(
                "connection refused".to_string()
            )))
        );
    }

    #[test]
    fn unavailable_store_is_not_a_missing_record() {
        let store = FakeStore::default();
        store.insert_history(history_record("H-1", &owner(), &report_json().to_string()));
        store.fail_reads(StoreError::Unavailable("HTTP 502".to_string()));
        let err = HistoryLookup::new(&store).fetch("H-1", &owner());
        assert_eq!(
            err,
            Err(LookupError::Remote(StoreError::Unavailable("HTTP 502".to_string())))
        );
    }
}
