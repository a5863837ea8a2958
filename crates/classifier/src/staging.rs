use std::io::{self, Write};
use std::path::Path;

use tempfile::{Builder, NamedTempFile};
use tracing::debug;

/// A request-scoped file on disk. The file is removed when the value is
/// dropped, including while unwinding from a panic.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
}

impl StagedFile {
    /// Creates an empty uniquely named file in `dir`, or the system temp dir.
    pub fn create(dir: Option<&Path>, extension: &str) -> io::Result<Self> {
        let suffix = format!(".{extension}");
        let mut builder = Builder::new();
        builder.prefix("genre-").suffix(&suffix);
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        debug!(path = ?file.path(), "staged file");
        Ok(Self { file })
    }

    pub fn with_contents(dir: Option<&Path>, extension: &str, bytes: &[u8]) -> io::Result<Self> {
        let mut staged = Self::create(dir, extension)?;
        staged.file.write_all(bytes)?;
        staged.file.flush()?;
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
