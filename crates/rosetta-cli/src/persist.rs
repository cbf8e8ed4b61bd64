//! On-disk layout of an extraction run
//!
//! ```text
//! <data_dir>/modules/<api_name>.json
//! <data_dir>/workflows/<name>_<id>.json
//! <data_dir>/blueprints/<name>_<id>.json
//! <data_dir>/blueprints/transitions/<blueprint_id>_<name>_<transition_id>.json
//! <data_dir>/functions/<name>_<id>.json
//! <data_dir>/<subsystem>/FAILED_EXTRACTIONS.json
//! <data_dir>/index/<subsystem>.json
//! ```

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-subsystem failure log name
pub const FAILED_EXTRACTIONS: &str = "FAILED_EXTRACTIONS.json";

/// Blueprint transitions directory name
pub const TRANSITIONS_DIR: &str = "transitions";

/// Replace characters that are not allowed in file names
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// `<name>_<id>.json`, sanitized
#[must_use]
pub fn document_file_name(name: &str, id: &str) -> String {
    sanitize_file_name(&format!("{name}_{id}.json"))
}

/// One failed item, as written to `FAILED_EXTRACTIONS.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Pipeline stage (`list`, `detail`, `fields`, ...)
    pub stage: String,
    /// Descriptor key
    pub key: String,
    /// `rate_limited`, `item_error`, `hard_error` or `not_attempted`
    pub kind: String,
    /// Reason text
    pub reason: String,
    /// Attempts made
    pub attempts: u32,
}

#[derive(Serialize)]
struct FailureLog<'a> {
    subsystem: &'a str,
    generated_at: String,
    total_failed: usize,
    failures: &'a [FailureRecord],
}

/// Paths of one extraction tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Layout rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one subsystem
    #[must_use]
    pub fn subsystem_dir(&self, subsystem: &str) -> PathBuf {
        self.root.join(subsystem)
    }

    /// Blueprint transitions directory
    #[must_use]
    pub fn transitions_dir(&self) -> PathBuf {
        self.root.join("blueprints").join(TRANSITIONS_DIR)
    }

    /// List responses as fetched
    #[must_use]
    pub fn index_file(&self, subsystem: &str) -> PathBuf {
        self.root.join("index").join(format!("{subsystem}.json"))
    }

    /// Write a document into a subsystem directory
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_document(&self, subsystem: &str, file_name: &str, value: &Value) -> anyhow::Result<PathBuf> {
        let path = self.subsystem_dir(subsystem).join(sanitize_file_name(file_name));
        write_json(&path, value)?;
        Ok(path)
    }

    /// Write the failure log of a subsystem; nothing is written when empty
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_failures(
        &self,
        subsystem: &str,
        failures: &[FailureRecord],
    ) -> anyhow::Result<Option<PathBuf>> {
        if failures.is_empty() {
            return Ok(None);
        }
        let path = self.subsystem_dir(subsystem).join(FAILED_EXTRACTIONS);
        let log = FailureLog {
            subsystem,
            generated_at: chrono::Utc::now().to_rfc3339(),
            total_failed: failures.len(),
            failures,
        };
        write_json(&path, &log)?;
        tracing::warn!("{subsystem}: {} failures logged to {}", failures.len(), path.display());
        Ok(Some(path))
    }
}

/// Pretty-print `value` to `path`, creating parent directories
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!("wrote {}", path.display());
    Ok(())
}

/// Read every `*.json` document in `dir`, sorted by file name
///
/// Failure logs are skipped. Unreadable or malformed files are logged and
/// counted, never fatal. A missing directory yields nothing.
#[must_use]
pub fn read_documents(dir: &Path) -> (Vec<(PathBuf, Value)>, usize) {
    let Ok(read_dir) = fs::read_dir(dir) else {
        tracing::debug!("{} does not exist, nothing to read", dir.display());
        return (Vec::new(), 0);
    };

    let mut paths: Vec<PathBuf> = read_dir
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| ext == "json")
                && path.file_name().is_some_and(|name| name != FAILED_EXTRACTIONS)
        })
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    let mut unreadable = 0;
    for path in paths {
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()));
        match parsed {
            Ok(value) => documents.push((path, value)),
            Err(reason) => {
                tracing::warn!("skipping {}: {reason}", path.display());
                unreadable += 1;
            }
        }
    }
    (documents, unreadable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitizes_reserved_characters() {
        assert_eq!(sanitize_file_name(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(document_file_name("Stage: Sync/2", "42"), "Stage_ Sync_2_42.json");
    }

    #[test]
    fn writes_and_reads_documents() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());

        layout
            .write_document("workflows", "b_2.json", &json!({"id": "2"}))
            .unwrap();
        layout
            .write_document("workflows", "a_1.json", &json!({"id": "1"}))
            .unwrap();
        std::fs::write(layout.subsystem_dir("workflows").join("broken.json"), "{").unwrap();

        let (documents, unreadable) = read_documents(&layout.subsystem_dir("workflows"));
        let ids: Vec<&Value> = documents.iter().map(|(_, doc)| &doc["id"]).collect();
        assert_eq!(ids, vec![&json!("1"), &json!("2")]);
        assert_eq!(unreadable, 1);
    }

    #[test]
    fn failure_log_is_skipped_by_reader() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let failure = FailureRecord {
            stage: "detail".into(),
            key: "workflow:1".into(),
            kind: "rate_limited".into(),
            reason: "HTTP 429".into(),
            attempts: 2,
        };

        let path = layout.write_failures("workflows", &[failure]).unwrap().unwrap();
        assert!(path.ends_with("workflows/FAILED_EXTRACTIONS.json"));
        assert!(layout.write_failures("functions", &[]).unwrap().is_none());

        let (documents, unreadable) = read_documents(&layout.subsystem_dir("workflows"));
        assert!(documents.is_empty());
        assert_eq!(unreadable, 0);
    }

    #[test]
    fn missing_directory_reads_nothing() {
        let (documents, unreadable) = read_documents(Path::new("/no/such/dir"));
        assert!(documents.is_empty());
        assert_eq!(unreadable, 0);
    }
}
