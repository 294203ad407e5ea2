//! Migration catalog: enumerate, parse and validate migration files.
//!
//! File names follow `<NNNN>[_description].sql`. The version is the part of
//! the name before the first `_`, or the whole stem when there is no `_`.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{MigrantError, Result};
use crate::remote::{EntryKind, RemoteRepository};
use crate::version::Version;

/// One migration file, read once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub version: Version,
    pub filename: String,
    pub content: String,
}

impl MigrationFile {
    /// Build a migration from a file name and its content, parsing the version.
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        let filename = filename.into();
        let version = version_from_filename(&filename)?;
        Ok(Self {
            version,
            filename,
            content: content.into(),
        })
    }
}

/// Extract and validate the version encoded in a migration file name.
pub fn version_from_filename(filename: &str) -> Result<Version> {
    let stem = match filename.rfind('.') {
        Some(idx) => &filename[..idx],
        None => filename,
    };
    let raw = stem.split('_').next().unwrap_or(stem);
    Version::parse_for(raw, filename)
}

/// Read every non-directory entry of `dir` as a migration.
///
/// Entries are returned sorted by file name. With fixed-width versions this is
/// also ascending version order.
pub fn list_local(dir: &Path) -> Result<Vec<MigrationFile>> {
    let entries = fs::read_dir(dir).map_err(|e| MigrantError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MigrantError::io(dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| MigrantError::io(entry.path(), e))?;
        if file_type.is_dir() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        let version = version_from_filename(&filename)?;
        let path = entry.path();
        let content = fs::read_to_string(&path)
            .map_err(|e| MigrantError::io(&path, e))?;
        files.push(MigrationFile {
            version,
            filename,
            content,
        });
    }

    files.sort_by(|a, b| a.filename.cmp(&b.filename));
    debug!(dir = %dir.display(), count = files.len(), "listed local migrations");
    Ok(files)
}

/// Fetch the migration directory from a remote repository, keeping the
/// repository's ordering. Directories in the listing are ignored.
pub async fn list_remote(remote: &dyn RemoteRepository, dir: &str) -> Result<Vec<MigrationFile>> {
    let entries = remote.list_dir(dir).await?;

    let mut files = Vec::new();
    for entry in entries
        .into_iter()
        .filter(|e| e.kind == EntryKind::File)
    {
        let version = version_from_filename(&entry.name)?;
        let content = remote.download(&entry.path).await?;
        files.push(MigrationFile {
            version,
            filename: entry.name,
            content,
        });
    }
    debug!(dir, count = files.len(), "listed remote migrations");
    Ok(files)
}

/// Ensure versions increase by exactly one from entry to entry.
///
/// The first version is unconstrained. Entries are checked in version order
/// regardless of the order they are passed in.
pub fn validate_contiguous(catalog: &[MigrationFile]) -> Result<()> {
    let mut ordered: Vec<&MigrationFile> = catalog.iter().collect();
    ordered.sort_by(|a, b| a.version.cmp(&b.version));

    for pair in ordered.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        if prev.version == cur.version {
            return Err(MigrantError::DuplicateVersion {
                version: cur.version.to_string(),
                first: prev.filename.clone(),
                second: cur.filename.clone(),
            });
        }
        if !prev.version.is_followed_by(&cur.version) {
            return Err(MigrantError::VersionGap {
                previous: prev.version.to_string(),
                found: cur.version.to_string(),
            });
        }
    }
    Ok(())
}

/// The migration with the highest version, if any.
pub fn latest(catalog: &[MigrationFile]) -> Option<&MigrationFile> {
    catalog.iter().max_by(|a, b| a.version.cmp(&b.version))
}

/// Version for a newly generated migration: one past the highest existing
/// version, or `0000` for an empty directory.
pub fn next_version(catalog: &[MigrationFile]) -> Result<Version> {
    match latest(catalog) {
        Some(file) => file.version.next(),
        None => Ok(Version::initial()),
    }
}
