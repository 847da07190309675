use std::path::{Path, PathBuf};

use crate::capture::domain::photo_sink::PhotoSink;

/// Writes delivered photos into a directory, creating it on first use.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }
}

impl PhotoSink for DirectorySink {
    fn deliver(&self, file_name: &str, png: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(file_name);
        std::fs::write(&path, png)?;
        log::info!("Saved {}", path.display());
        Ok(())
    }
}
