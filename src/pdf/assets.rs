use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ExtractError, Result};

/// Persists rendered diagrams. Returns where the asset ended up.
pub trait AssetWriter {
    fn write_image(&self, png: &[u8], suggested_name: &str) -> Result<PathBuf>;
}

/// Writes assets into one directory, creating it on first use.
pub struct DirAssetWriter {
    dir: PathBuf,
}

impl DirAssetWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl AssetWriter for DirAssetWriter {
    fn write_image(&self, png: &[u8], suggested_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| ExtractError::asset(suggested_name, e))?;
        let path = self.dir.join(suggested_name);
        fs::write(&path, png).map_err(|e| ExtractError::asset(suggested_name, e))?;
        Ok(path)
    }
}

/// Keeps assets in memory under a virtual directory.
#[derive(Default)]
pub struct MemoryAssetWriter {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryAssetWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.files.lock().map(|f| f.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(name).cloned()
    }
}

impl AssetWriter for MemoryAssetWriter {
    fn write_image(&self, png: &[u8], suggested_name: &str) -> Result<PathBuf> {
        let mut files = self
            .files
            .lock()
            .map_err(|e| ExtractError::asset(suggested_name, e))?;
        files.insert(suggested_name.to_string(), png.to_vec());
        Ok(Path::new("memory").join(suggested_name))
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_writer_creates_missing_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = DirAssetWriter::new(tmp.path().join("nested/out"));
        let path = writer.write_image(b"png", "diagram_p1_i0.png").unwrap();
        assert_eq!(path, tmp.path().join("nested/out/diagram_p1_i0.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png");
    }

    #[test]
    fn dir_writer_reports_unwritable_target() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let writer = DirAssetWriter::new(&blocker);
        let err = writer.write_image(b"png", "a.png").unwrap_err();
        assert!(matches!(err, ExtractError::AssetWrite { ref name, .. } if name == "a.png"));
    }

    #[test]
    fn memory_writer_overwrites_same_name() {
        let writer = MemoryAssetWriter::new();
        writer.write_image(b"one", "d.png").unwrap();
        writer.write_image(b"two", "d.png").unwrap();
        assert_eq!(writer.names(), vec!["d.png"]);
        assert_eq!(writer.get("d.png").unwrap(), b"two");
    }
}
