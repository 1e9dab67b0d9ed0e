//! Common test fixtures for storage tests.
//!
//! Each fixture owns a temporary directory that is removed on drop.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Scratch directory for log files.
pub struct TempLogDir {
    dir: TempDir,
}

impl TempLogDir {
    /// Create a new empty scratch directory.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Root of the scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a log named `stem` (with the `.ddz` extension) inside the directory.
    pub fn log_path(&self, stem: &str) -> PathBuf {
        self.dir.path().join(format!("{stem}.ddz"))
    }
}

/// Common dataset names used in tests.
pub mod names {
    pub const DATA: &str = "data";
    pub const CALIBRATION: &str = "calibration";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_has_extension() {
        let dir = TempLogDir::new().unwrap();
        let path = dir.log_path("run");
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("ddz"));
        assert!(path.starts_with(dir.path()));
    }
}
