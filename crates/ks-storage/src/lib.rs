//! Local KML file persistence.

use ks_core::KmlError;
use ks_core::KmlResult;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

/// Reads and writes KML text relative to an optional base directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KmlStore {
    base_dir: Option<PathBuf>,
}

impl KmlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, base_dir: PathBuf) -> Self {
        self.base_dir = Some(base_dir);
        self
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Absolute paths are used as given; relative ones join the base directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn read(&self, path: &Path) -> KmlResult<String> {
        let resolved = self.resolve(path);
        let bytes = fs::read(&resolved).map_err(|source| KmlError::Io {
            path: resolved.clone(),
            source,
        })?;

        Ok(decode_utf8(bytes))
    }

    /// Writes `contents`, creating missing parent directories.
    pub fn write(&self, path: &Path, contents: &str) -> KmlResult<PathBuf> {
        let resolved = self.resolve(path);

        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| KmlError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        fs::write(&resolved, contents).map_err(|source| KmlError::Io {
            path: resolved.clone(),
            source,
        })?;

        Ok(resolved)
    }
}

/// Decodes file bytes as UTF-8, dropping a leading byte-order mark.
fn decode_utf8(bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(error) => String::from_utf8_lossy(error.as_bytes()).into_owned(),
    };

    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_owned(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::KmlStore;
    use ks_core::KmlError;
    use std::path::Path;

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir();
        let dir = match dir {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let store = KmlStore::new().with_base_dir(dir.path().to_path_buf());

        let written = store.write(Path::new("out/modified.kml"), "<kml/>");
        assert!(written.is_ok());
        assert_eq!(store.read(Path::new("out/modified.kml")).ok().as_deref(), Some("<kml/>"));
    }

    #[test]
    fn read_strips_byte_order_mark() {
        let dir = match tempfile::tempdir() {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let path = dir.path().join("bom.kml");
        assert!(std::fs::write(&path, "\u{feff}<kml/>").is_ok());

        assert_eq!(KmlStore::new().read(&path).ok().as_deref(), Some("<kml/>"));
    }

    #[test]
    fn missing_file_reports_io_error_with_path() {
        let dir = match tempfile::tempdir() {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let store = KmlStore::new().with_base_dir(dir.path().to_path_buf());

        let result = store.read(Path::new("absent.kml"));
        match result {
            Err(KmlError::Io { path, .. }) => assert_eq!(path, dir.path().join("absent.kml")),
            other => panic!("expected I/O error, got {other:?}"),
        }
    }
}
