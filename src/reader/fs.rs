//! Filesystem-backed resource reader.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

use super::ResourceReader;

/// Reads resources from a root directory, addressing them by normalized
/// `/path/from/root` strings.
pub struct FsResourceReader {
    root: PathBuf,
}

impl FsResourceReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn to_fs_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl ResourceReader for FsResourceReader {
    fn get_resource(&self, path: &str) -> Result<String, EngineError> {
        let fs_path = self.to_fs_path(path);
        fs::read_to_string(&fs_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(path.to_string())
            } else {
                EngineError::Io(fs_path, e)
            }
        })
    }

    fn get_resource_names(&self, dir_path: &str) -> BTreeSet<String> {
        let fs_path = self.to_fs_path(dir_path);
        let Ok(entries) = fs::read_dir(&fs_path) else {
            return BTreeSet::new();
        };
        entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect()
    }

    fn is_directory(&self, path: &str) -> bool {
        self.to_fs_path(path).is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_resource_reads_content() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/a.js"), "var a = 1;").unwrap();

        let reader = FsResourceReader::new(dir.path());
        assert_eq!(reader.get_resource("/js/a.js").unwrap(), "var a = 1;");
    }

    #[test]
    fn test_get_resource_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let reader = FsResourceReader::new(dir.path());
        let err = reader.get_resource("/js/missing.js").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_resource_names_sorted() {
        let dir = TempDir::new().unwrap();
        let js = dir.path().join("js");
        fs::create_dir_all(&js).unwrap();
        fs::write(js.join("b.js"), "").unwrap();
        fs::write(js.join("a.js"), "").unwrap();

        let reader = FsResourceReader::new(dir.path());
        let names: Vec<String> = reader.get_resource_names("/js").into_iter().collect();
        assert_eq!(names, vec!["a.js", "b.js"]);
    }

    #[test]
    fn test_is_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/x.css"), "").unwrap();

        let reader = FsResourceReader::new(dir.path());
        assert!(reader.is_directory("/css"));
        assert!(!reader.is_directory("/css/x.css"));
        assert!(!reader.is_directory("/nope"));
    }
}
