//! Diagnostic dumps of transformed classes.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Content handed to a [`DumpSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dump<'a> {
    /// Disassembly of the class as far as the transform got.
    Text(String),
    /// Raw class bytes.
    Bytes(&'a [u8]),
}

impl Dump<'_> {
    fn extension(&self) -> &'static str {
        match self {
            Dump::Text(_) => "txt",
            Dump::Bytes(_) => "bin",
        }
    }

    fn contents(&self) -> &[u8] {
        match self {
            Dump::Text(text) => text.as_bytes(),
            Dump::Bytes(bytes) => bytes,
        }
    }
}

/// Receiver of diagnostic dumps. Errors are logged by the caller and never replace the failure
/// being diagnosed.
pub trait DumpSink: Send + Sync {
    fn dump(&self, class: &str, dump: &Dump<'_>) -> io::Result<()>;
}

/// Writes each dump to `<dir>/<class>.txt` or `.bin`, with `/` and `.` in the class name
/// replaced by `#`.
///
/// A dump is written to a temporary file in `dir` and renamed into place, so concurrent dumps of
/// one class leave exactly one complete file (the last to finish wins).
#[derive(Debug, Clone)]
pub struct FileDumpSink {
    dir: PathBuf,
}

impl FileDumpSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a dump of `class` is written to.
    pub fn path_for(&self, class: &str, dump: &Dump<'_>) -> PathBuf {
        let stem: String = class
            .chars()
            .map(|c| if c == '/' || c == '.' { '#' } else { c })
            .collect();
        self.dir.join(format!("{stem}.{}", dump.extension()))
    }
}

impl DumpSink for FileDumpSink {
    fn dump(&self, class: &str, dump: &Dump<'_>) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(class, dump);
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(dump.contents())?;
        file.persist(&path).map_err(|e| e.error)?;
        tracing::debug!("Dumped {} to {}", class, path.display());
        Ok(())
    }
}

/// Sink that discards every dump.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDumpSink;

impl DumpSink for NullDumpSink {
    fn dump(&self, _class: &str, _dump: &Dump<'_>) -> io::Result<()> {
        Ok(())
    }
}
