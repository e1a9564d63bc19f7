//! Content digests of model directories

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::domain::DomainError;

/// SHA-256 over the model definition followed by the files of its directory.
///
/// Files are visited in sorted relative-path order; both the path and the
/// contents of each file feed the hash. Paths in `excluded` are skipped.
pub fn model_digest(yaml_path: &Path, excluded: &HashSet<PathBuf>) -> Result<String, DomainError> {
    let mut hasher = Sha256::new();
    hasher.update(std::fs::read(yaml_path)?);

    let Some(model_dir) = yaml_path.parent() else {
        return Ok(hex::encode(hasher.finalize()));
    };

    let mut files = Vec::new();
    collect_files(model_dir, &mut files)?;
    files.sort();

    for file in files {
        if file == yaml_path || excluded.contains(&file) {
            continue;
        }
        let relative = file.strip_prefix(model_dir).unwrap_or(&file);
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(std::fs::read(&file)?);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Recursively lists regular files, skipping hidden entries
pub(crate) fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DomainError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_model(dir: &Path, yaml: &str, code: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let yaml_path = dir.join("model.yaml");
        std::fs::write(&yaml_path, yaml).unwrap();
        std::fs::write(dir.join("custom.py"), code).unwrap();
        yaml_path
    }

    #[test]
    fn test_digest_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_model(dir.path(), "git_model_id: m1\n", "def score(): pass\n");

        let a = model_digest(&yaml, &HashSet::new()).unwrap();
        let b = model_digest(&yaml, &HashSet::new()).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_digest_tracks_yaml_and_sources() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_model(dir.path(), "git_model_id: m1\n", "v1\n");
        let original = model_digest(&yaml, &HashSet::new()).unwrap();

        std::fs::write(dir.path().join("custom.py"), "v2\n").unwrap();
        let source_changed = model_digest(&yaml, &HashSet::new()).unwrap();
        assert_ne!(original, source_changed);

        std::fs::write(&yaml, "git_model_id: m1\nsettings: {}\n").unwrap();
        let yaml_changed = model_digest(&yaml, &HashSet::new()).unwrap();
        assert_ne!(source_changed, yaml_changed);
    }

    #[test]
    fn test_digest_ignores_hidden_and_excluded_files() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_model(dir.path(), "git_model_id: m1\n", "v1\n");
        let original = model_digest(&yaml, &HashSet::new()).unwrap();

        std::fs::write(dir.path().join(".cache"), "noise").unwrap();
        let deployment = dir.path().join("deployment.yaml");
        std::fs::write(&deployment, "git_deployment_id: d1\n").unwrap();

        let excluded: HashSet<PathBuf> = [deployment].into_iter().collect();
        assert_eq!(model_digest(&yaml, &excluded).unwrap(), original);
    }
}
