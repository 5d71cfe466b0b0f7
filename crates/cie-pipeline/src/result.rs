//! The per-run ingestion result exposed to callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Full,
    Incremental,
}

/// Wall-clock milliseconds per pipeline phase.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub load_ms: u64,
    pub parse_ms: u64,
    pub resolve_ms: u64,
    pub embed_ms: u64,
    pub write_ms: u64,
}

/// Delta shape of an incremental run, `None` for full runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeltaCounts {
    pub added: u64,
    pub modified: u64,
    pub deleted: u64,
    pub renamed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    pub project_id: String,
    pub run_id: String,
    pub mode: RunMode,

    pub files_processed: u64,
    pub functions_extracted: u64,
    pub types_extracted: u64,
    pub fields_extracted: u64,
    pub imports_extracted: u64,
    pub defines_edges: u64,
    pub defines_type_edges: u64,
    pub calls_edges: u64,
    pub implements_edges: u64,

    pub parse_errors: u64,
    pub embedding_errors: u64,
    pub code_text_truncated: u64,
    /// Skip-reason histogram from the loader / delta post-filter.
    pub skipped: BTreeMap<String, u64>,

    pub timings: PhaseTimings,
    pub delta: Option<DeltaCounts>,
    pub last_indexed_ref: Option<String>,
}

impl IngestionResult {
    pub fn new(project_id: String, run_id: String, mode: RunMode) -> Self {
        Self {
            project_id,
            run_id,
            mode,
            files_processed: 0,
            functions_extracted: 0,
            types_extracted: 0,
            fields_extracted: 0,
            imports_extracted: 0,
            defines_edges: 0,
            defines_type_edges: 0,
            calls_edges: 0,
            implements_edges: 0,
            parse_errors: 0,
            embedding_errors: 0,
            code_text_truncated: 0,
            skipped: BTreeMap::new(),
            timings: PhaseTimings::default(),
            delta: None,
            last_indexed_ref: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_round_trips_through_json() {
        let mut result = IngestionResult::new("proj:1".into(), "run-1".into(), RunMode::Incremental);
        result.files_processed = 3;
        result.delta = Some(DeltaCounts { added: 1, modified: 1, deleted: 0, renamed: 1 });
        result.skipped.insert("binary".to_string(), 2);

        let json = serde_json::to_string(&result).unwrap();
        let back: IngestionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.files_processed, 3);
        assert_eq!(back.mode, RunMode::Incremental);
        assert_eq!(back.delta.unwrap().renamed, 1);
        assert_eq!(back.skipped.get("binary"), Some(&2));
    }
}
