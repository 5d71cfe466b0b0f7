//! Append-only diagnostic log under `<repo>/.cie/index.log`: one
//! line per ingestion-relevant event, ISO-8601 timestamp prefix. Written
//! directly rather than through `tracing` so it survives runs with logging
//! disabled. The guarding mutex is the one piece of process-wide mutable
//! state the design allows.

use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

static LOG_GUARD: Mutex<()> = Mutex::new(());

pub struct IndexLog {
    path: PathBuf,
}

impl IndexLog {
    pub fn new(project_root: &Path) -> Self {
        Self {
            path: cie_core::config::CieConfig::cie_dir(project_root).join("index.log"),
        }
    }

    /// Append one event line. Best-effort: a failing log write never fails
    /// the run it is describing.
    pub fn append(&self, event: &str) {
        let Ok(_guard) = LOG_GUARD.lock() else {
            return;
        };
        if let Some(parent) = self.path.parent()
            && std::fs::create_dir_all(parent).is_err()
        {
            return;
        }
        let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        else {
            return;
        };
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let _ = writeln!(file, "{timestamp} {event}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_accumulate_with_timestamp_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let log = IndexLog::new(tmp.path());
        log.append("run_started mode=full");
        log.append("run_completed files=3");

        let content = std::fs::read_to_string(tmp.path().join(".cie/index.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("run_started mode=full"));
        // ISO-8601 prefix, e.g. 2026-08-01T12:00:00Z
        assert!(lines[0].contains('T'));
        assert!(lines[0].split(' ').next().unwrap().ends_with('Z'));
    }
}
