//! Download sinks: where exported files end up.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{RenderError, RenderResult};

/// Receives a finished export under its filename.
pub trait DownloadSink: Send + Sync {
    /// Save `bytes` as `filename`, returning where they went.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Download`] if the file cannot be stored.
    fn save(&self, filename: &str, bytes: &[u8]) -> RenderResult<String>;
}

fn check_filename(filename: &str) -> RenderResult<()> {
    if filename.is_empty()
        || filename.contains(['/', '\\'])
        || filename == "."
        || filename == ".."
    {
        return Err(RenderError::Download(format!(
            "Invalid filename: {filename:?}"
        )));
    }
    Ok(())
}

/// Writes files into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create a sink writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn save(&self, filename: &str, bytes: &[u8]) -> RenderResult<String> {
        check_filename(filename)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            RenderError::Download(format!("Failed to create {}: {e}", self.dir.display()))
        })?;
        let path = self.dir.join(filename);
        std::fs::write(&path, bytes)
            .map_err(|e| RenderError::Download(format!("Failed to write {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), size = bytes.len(), "Saved export");
        Ok(path.display().to_string())
    }
}

/// Keeps saved files in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved `(filename, bytes)` pairs in save order.
    #[must_use]
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Number of saved files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.lock().map_or(0, |f| f.len())
    }

    /// Whether nothing was saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DownloadSink for MemorySink {
    fn save(&self, filename: &str, bytes: &[u8]) -> RenderResult<String> {
        check_filename(filename)?;
        self.files
            .lock()
            .map_err(|_| RenderError::Download("Memory sink poisoned".to_string()))?
            .push((filename.to_string(), bytes.to_vec()));
        Ok(format!("memory:{filename}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = DirectorySink::new(dir.path().join("out"));

        let location = sink.save("meme-1.png", b"png").expect("save");
        assert!(location.ends_with("meme-1.png"));
        assert_eq!(
            std::fs::read(dir.path().join("out").join("meme-1.png")).expect("read"),
            b"png"
        );
    }

    #[test]
    fn test_rejects_path_traversal() {
        let sink = MemorySink::new();
        assert!(sink.save("../evil.png", b"x").is_err());
        assert!(sink.save("", b"x").is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_memory_sink_records() {
        let sink = MemorySink::new();
        sink.save("a.png", b"1").expect("save");
        sink.save("b.jpeg", b"2").expect("save");
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.files()[1].0, "b.jpeg");
    }
}
