//! On-disk output: the CSV table and its manifest land side by side, each
//! swapped in with a single rename.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

const MANIFEST_SUFFIX: &str = ".manifest.json";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot use {} as output directory: {reason}", path.display())]
    OutputDir { path: PathBuf, reason: String },
    #[error("output path {} has no file name", .0.display())]
    NoFileName(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Creates `dir` (and parents) unless it already exists as a directory.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let refuse = |reason: String| PersistError::OutputDir {
        path: dir.to_path_buf(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(refuse("a file is in the way".into())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| refuse(e.to_string()))
        }
        Err(err) => Err(refuse(err.to_string())),
    }
}

/// Where one export goes: `<dir>/<name>.csv` plus `<dir>/<stem>.manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    dir: PathBuf,
    table_name: String,
    manifest_name: String,
}

impl OutputTarget {
    /// A bare file name resolves against the working directory.
    pub fn from_path(path: &Path) -> Result<Self, PersistError> {
        let table_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PersistError::NoFileName(path.to_path_buf()))?
            .to_string();
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&table_name);
        let manifest_name = format!("{stem}{MANIFEST_SUFFIX}");
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self {
            dir,
            table_name,
            manifest_name,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(&self.manifest_name)
    }

    /// Replaces the CSV table. A failed write leaves any previous table untouched.
    pub fn write_table(&self, content: impl AsRef<[u8]>) -> Result<PathBuf, PersistError> {
        replace_file(&self.dir, &self.table_name, content.as_ref())
    }

    pub fn write_manifest(&self, content: impl AsRef<[u8]>) -> Result<PathBuf, PersistError> {
        replace_file(&self.dir, &self.manifest_name, content.as_ref())
    }
}

// The temp file lives in `dir` so the final rename never crosses filesystems.
fn replace_file(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
    ensure_output_dir(dir)?;
    let target = dir.join(filename);
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_sits_next_to_the_table() {
        let target = OutputTarget::from_path(Path::new("out/records.csv")).unwrap();
        assert_eq!(target.table_name(), "records.csv");
        assert_eq!(target.manifest_path(), Path::new("out/records.manifest.json"));
    }

    #[test]
    fn bare_name_uses_working_directory() {
        let target = OutputTarget::from_path(Path::new("records.csv")).unwrap();
        assert_eq!(target.manifest_path(), Path::new("./records.manifest.json"));
    }

    #[test]
    fn path_without_file_name_is_rejected() {
        assert!(matches!(
            OutputTarget::from_path(Path::new("/")),
            Err(PersistError::NoFileName(_))
        ));
    }
}
