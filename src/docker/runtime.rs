//! The runtime library embedded into every image.
//!
//! The library is an opaque blob owned by the build process. It is loaded
//! once, encoded once, and then shared read-only by every generation call.

use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;

use crate::error::ResourceError;

/// Directory the library is installed into; also the image's `PYTHONPATH`.
pub const RUNTIME_INSTALL_DIR: &str = "/usr/local/lib/cog";

/// File name of the installed library.
pub const RUNTIME_FILE_NAME: &str = "cog.py";

/// Serving dependencies installed alongside the library.
pub const RUNTIME_DEPENDENCIES: [&str; 3] = ["flask", "requests", "redis"];

/// Immutable runtime library bytes plus their base64 form.
#[derive(Debug, Clone)]
pub struct RuntimeLibrary {
    bytes: Arc<[u8]>,
    encoded: Arc<str>,
}

impl RuntimeLibrary {
    /// Wrap library bytes already in memory.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let bytes: Arc<[u8]> = bytes.into();
        let encoded: Arc<str> = BASE64.encode(&bytes).into();
        Self { bytes, encoded }
    }

    /// Read the library from disk. Empty files are rejected.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ResourceError::NotFound(shown.clone())
            } else {
                ResourceError::Read {
                    path: shown.clone(),
                    source,
                }
            }
        })?;
        if bytes.is_empty() {
            return Err(ResourceError::Empty(shown));
        }
        debug!(path = %path.display(), size = bytes.len(), "Loaded runtime library");
        Ok(Self::from_bytes(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Standard base64 (with padding) of the library bytes.
    pub fn base64(&self) -> &str {
        &self.encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_is_standard_padded() {
        let lib = RuntimeLibrary::from_bytes(b"import sys\n".to_vec());
        assert_eq!(lib.base64(), "aW1wb3J0IHN5cwo=");
        assert_eq!(lib.bytes(), b"import sys\n");
    }

    #[test]
    fn test_clones_share_the_same_buffer() {
        let lib = RuntimeLibrary::from_bytes(vec![1u8, 2, 3]);
        let copy = lib.clone();
        assert!(std::ptr::eq(lib.bytes().as_ptr(), copy.bytes().as_ptr()));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cog.py");
        std::fs::write(&path, "class HTTPServer: pass\n").unwrap();

        let lib = RuntimeLibrary::load(&path).unwrap();
        assert_eq!(lib.bytes(), b"class HTTPServer: pass\n");
    }

    #[test]
    fn test_load_missing_or_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.py");
        assert!(matches!(
            RuntimeLibrary::load(&missing),
            Err(ResourceError::NotFound(_))
        ));

        let empty = dir.path().join("empty.py");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(
            RuntimeLibrary::load(&empty),
            Err(ResourceError::Empty(_))
        ));
    }
}
