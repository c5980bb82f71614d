//! Per-turn call log, appended as JSON Lines rather than read-modify-write
//! over a whole YAML file: the audit intent is unchanged, only the file
//! format and write pattern.

use std::io::Write;
use std::path::{Path, PathBuf};
use tom_core::model::CallLogEntry;

pub struct CallLogWriter {
    path: PathBuf,
}

impl CallLogWriter {
    pub fn new(all_datadir: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::create_dir_all(all_datadir.as_ref())?;
        Ok(Self {
            path: all_datadir.as_ref().join("call_logs.jsonl"),
        })
    }

    pub fn append(&self, entry: &CallLogEntry) -> std::io::Result<()> {
        let line = serde_json::to_string(entry).expect("CallLogEntry always serializes");
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn append_writes_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CallLogWriter::new(dir.path()).unwrap();
        let entry = CallLogEntry {
            timestamp: Utc::now(),
            username: "alice".into(),
            user_input: "hi".into(),
            functions_called: vec![],
            duration_ms: 10,
        };
        writer.append(&entry).unwrap();
        writer.append(&entry).unwrap();
        let contents = std::fs::read_to_string(dir.path().join("call_logs.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
