use std::path::{Path, PathBuf};

/// `<output_dir>/<stem>.json` for a source file name.
pub fn output_path_for(output_dir: &Path, file_name: &str) -> PathBuf {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    output_dir.join(format!("{stem}.json"))
}

/// True when an output already exists for `file_name`. Contents are not checked.
pub fn is_processed(output_dir: &Path, file_name: &str) -> bool {
    output_path_for(output_dir, file_name).exists()
}
