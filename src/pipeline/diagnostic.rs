//! Diagnostic dump: writes intermediate artifacts of a `parse` run to disk.
//!
//! Disabled unless `POLICY_EXTRACT_DUMP_DIR` is set.
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{stem}/
//!   00-source-info.json
//!   01-pages.json
//!   02-debug-info.json
//!   03-metadata-prompt.txt
//!   04-metadata-response.txt
//!   05-final-result.json
//! ```

use std::path::{Path, PathBuf};

pub const DUMP_DIR_VAR: &str = "POLICY_EXTRACT_DUMP_DIR";

/// Returns the dump directory for a source document, or `None` if diagnostics are disabled.
///
/// Creates the directory tree on first call. Returns `None` (with a warning) if
/// directory creation fails. Never panics, never blocks the pipeline.
pub fn dump_dir_for(source: &Path) -> Option<PathBuf> {
    let base = std::env::var_os(DUMP_DIR_VAR).filter(|v| !v.is_empty())?;
    dump_dir_in(Path::new(&base), source)
}

fn dump_dir_in(base: &Path, source: &Path) -> Option<PathBuf> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    let dir = base.join(stem);

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

/// Write a JSON artifact, pretty-printed. Never panics.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    match serde_json::to_vec_pretty(value) {
        Ok(bytes) => write_artifact(&dir.join(filename), &bytes),
        Err(e) => tracing::warn!(file = filename, error = %e, "Diagnostic dump: unserializable value"),
    }
}

/// Write a text artifact (prompt, raw model response). Never panics.
pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    write_artifact(&dir.join(filename), text.as_bytes());
}

fn write_artifact(path: &Path, bytes: &[u8]) {
    if let Err(e) = std::fs::write(path, bytes) {
        tracing::warn!(path = %path.display(), error = %e, "Diagnostic dump: write failed");
        return;
    }
    tracing::debug!(path = %path.display(), size = bytes.len(), "Diagnostic dump: artifact written");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_is_named_after_stem() {
        let tmp = tempfile::tempdir().unwrap();

        let dir = dump_dir_in(tmp.path(), Path::new("/data/raw_pdfs/安心保障.pdf")).unwrap();

        assert!(dir.exists());
        assert!(dir.ends_with("安心保障"));
    }

    #[test]
    fn uncreatable_directory_disables_dump() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        assert!(dump_dir_in(&blocker, Path::new("a.pdf")).is_none());
    }

    #[test]
    fn dump_json_writes_pretty_json() {
        let tmp = tempfile::tempdir().unwrap();

        dump_json(tmp.path(), "debug.json", &vec!["Page 2 OCR failed: boom"]);

        let content = std::fs::read_to_string(tmp.path().join("debug.json")).unwrap();
        assert!(content.contains("\n  \"Page 2 OCR failed: boom\""));
    }

    #[test]
    fn dump_text_writes_text() {
        let tmp = tempfile::tempdir().unwrap();

        dump_text(tmp.path(), "prompt.txt", "請擷取保單資訊");

        let content = std::fs::read_to_string(tmp.path().join("prompt.txt")).unwrap();
        assert_eq!(content, "請擷取保單資訊");
    }

    #[test]
    fn write_failures_do_not_panic() {
        let bad_dir = Path::new("/nonexistent/path/that/does/not/exist");
        dump_json(bad_dir, "test.json", &"data");
        dump_text(bad_dir, "test.txt", "data");
    }
}
