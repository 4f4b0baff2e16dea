//! Persistent bundle store: assembled text, its gzipped twin, and the
//! token mapping that lets a restarted process serve without rebuilding.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::error::EngineError;

/// Directory for the assembled text form.
const TEXT_DIR: &str = "text";

/// Directory for the gzipped form; stored file names carry this prefix.
pub const GZIP_PREFIX: &str = "gzip_";

const MAPPING_FILE: &str = "bundle-mapping.toml";

/// Storage for assembled bundles.
///
/// Every store keeps both representations of a bundle: the text and the
/// gzipped bytes, written together so they can never disagree.
pub trait BundleStore: Send + Sync {
    /// Persist both forms of an assembled bundle under its (possibly
    /// variant-decorated) name.
    fn store_bundle(&self, name: &str, content: &str) -> Result<(), EngineError>;

    /// The assembled text of a stored bundle.
    fn read_bundle(&self, name: &str) -> Result<String, EngineError>;

    /// The gzipped bytes of a stored bundle.
    fn read_bundle_gzipped(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    /// Persist the token mapping of a completed build pass.
    fn store_mapping(&self, mapping: &BTreeMap<String, String>) -> Result<(), EngineError>;

    /// The token mapping of the previous pass, if one was persisted.
    fn load_mapping(&self) -> Result<Option<BTreeMap<String, String>>, EngineError>;
}

/// Filesystem-backed store rooted at a working directory.
pub struct FsBundleStore {
    root: PathBuf,
}

impl FsBundleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn text_path(&self, name: &str) -> PathBuf {
        self.root.join(TEXT_DIR).join(name.trim_start_matches('/'))
    }

    fn gzip_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{GZIP_PREFIX}{}", name.trim_start_matches('/')))
    }

    fn write_file(path: &Path, bytes: &[u8]) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::Io(parent.to_path_buf(), e))?;
        }
        fs::write(path, bytes).map_err(|e| EngineError::Io(path.to_path_buf(), e))
    }

    fn gzip(content: &str) -> Result<Vec<u8>, EngineError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder
            .write_all(content.as_bytes())
            .and_then(|()| encoder.finish())
            .map_err(|e| EngineError::Io(PathBuf::from("<gzip>"), e))
    }
}

impl BundleStore for FsBundleStore {
    fn store_bundle(&self, name: &str, content: &str) -> Result<(), EngineError> {
        Self::write_file(&self.text_path(name), content.as_bytes())?;
        Self::write_file(&self.gzip_path(name), &Self::gzip(content)?)
    }

    fn read_bundle(&self, name: &str) -> Result<String, EngineError> {
        let path = self.text_path(name);
        fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(name.to_string())
            } else {
                EngineError::Io(path, e)
            }
        })
    }

    fn read_bundle_gzipped(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.gzip_path(name);
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(name.to_string())
            } else {
                EngineError::Io(path, e)
            }
        })
    }

    fn store_mapping(&self, mapping: &BTreeMap<String, String>) -> Result<(), EngineError> {
        let path = self.root.join(MAPPING_FILE);
        let rendered = toml::to_string(mapping)
            .map_err(|e| EngineError::Io(path.clone(), std::io::Error::other(e)))?;
        Self::write_file(&path, rendered.as_bytes())
    }

    fn load_mapping(&self) -> Result<Option<BTreeMap<String, String>>, EngineError> {
        let path = self.root.join(MAPPING_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::Io(path, e)),
        };
        let mapping = toml::from_str(&content)
            .map_err(|e| EngineError::Io(path, std::io::Error::other(e)))?;
        Ok(Some(mapping))
    }
}
