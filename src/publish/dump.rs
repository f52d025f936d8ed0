//! Evidence dumps for results that need human review

use super::traits::StoreResult;
use crate::aggregate::Evidence;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes raw evidence to `<dir>/<key>.<digest>.out`
#[derive(Debug, Clone)]
pub struct EvidenceDump {
    dir: PathBuf,
}

impl EvidenceDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `evidence` for `key`. Returns the file path, or `None` when
    /// there is no evidence to write. An existing file with the same digest is
    /// left untouched.
    pub fn write(&self, key: &str, evidence: &Evidence) -> StoreResult<Option<PathBuf>> {
        let Some(digest) = evidence.digest() else {
            return Ok(None);
        };

        let path = self.dir.join(format!("{}.{}.out", file_stem(key), digest));
        if path.exists() {
            debug!(path = %path.display(), "evidence already dumped");
            return Ok(Some(path));
        }

        std::fs::create_dir_all(&self.dir)?;
        let bytes = evidence.concat();
        std::fs::write(&path, &bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "dumped evidence");
        Ok(Some(path))
    }
}

/// Keys may come from addresses; keep file names to a safe alphabet
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_once_per_digest() {
        let dir = TempDir::new().unwrap();
        let dump = EvidenceDump::new(dir.path().join("out"));
        let mut evidence = Evidence::new();
        evidence.push(Some("feed".into()), b"<html>maybe</html>".to_vec());

        let path = dump.write("clinic/a", &evidence).unwrap().unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("clinic_a."));
        assert!(path.to_string_lossy().ends_with(".out"));

        std::fs::write(&path, b"edited").unwrap();
        let again = dump.write("clinic/a", &evidence).unwrap().unwrap();
        assert_eq!(again, path);
        assert_eq!(std::fs::read(&path).unwrap(), b"edited");
    }

    #[test]
    fn empty_evidence_is_not_written() {
        let dir = TempDir::new().unwrap();
        let dump = EvidenceDump::new(dir.path());
        assert_eq!(dump.write("k", &Evidence::new()).unwrap(), None);
    }
}
