use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::safety::{ProjectGuard, SafetyError};

/// In-memory staging area for every file a patch run touches.
///
/// Files are read once, rewritten any number of times in memory, and only
/// written back by [`Changeset::commit`]. A failed step therefore leaves the
/// project untouched.
#[derive(Debug)]
#[must_use = "Changeset does nothing until commit() is called"]
pub struct Changeset {
    guard: ProjectGuard,
    files: BTreeMap<PathBuf, StagedFile>,
}

#[derive(Debug, Clone)]
struct StagedFile {
    /// Content as read from disk
    original: String,
    /// xxh3 hash of the bytes read, checked again before writing
    original_hash: u64,
    /// Content after all staged rewrites
    current: String,
}

/// A staged file whose content differs from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileChange<'a> {
    pub path: &'a Path,
    pub before: &'a str,
    pub after: &'a str,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("File changed on disk since it was read: {path}")]
    ConcurrentModification { path: PathBuf },

    #[error("File is not valid UTF-8: {path}")]
    InvalidUtf8 { path: PathBuf },

    #[error("File I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

impl Changeset {
    pub fn new(guard: ProjectGuard) -> Self {
        Self {
            guard,
            files: BTreeMap::new(),
        }
    }

    pub fn guard(&self) -> &ProjectGuard {
        &self.guard
    }

    /// Current content of `path`, staged or freshly read.
    ///
    /// Returns the canonical path the content is keyed under.
    pub fn read(&mut self, path: &Path) -> Result<(PathBuf, String), EditError> {
        let canonical = self.guard.validate_path(path)?;

        if let Some(staged) = self.files.get(&canonical) {
            return Ok((canonical, staged.current.clone()));
        }

        let bytes = fs::read(&canonical).map_err(|source| EditError::Io {
            path: canonical.clone(),
            source,
        })?;
        let original_hash = xxh3_64(&bytes);
        let original = String::from_utf8(bytes).map_err(|_| EditError::InvalidUtf8 {
            path: canonical.clone(),
        })?;

        let current = original.clone();
        self.files.insert(
            canonical.clone(),
            StagedFile {
                original,
                original_hash,
                current: current.clone(),
            },
        );
        Ok((canonical, current))
    }

    /// Replace the staged content of a file previously returned by `read`.
    pub fn stage(&mut self, canonical: &Path, content: String) {
        if let Some(staged) = self.files.get_mut(canonical) {
            staged.current = content;
        }
    }

    /// Files whose staged content differs from what was read.
    pub fn changes(&self) -> impl Iterator<Item = FileChange<'_>> {
        self.files
            .iter()
            .filter(|(_, staged)| staged.original != staged.current)
            .map(|(path, staged)| FileChange {
                path,
                before: &staged.original,
                after: &staged.current,
            })
    }

    /// Write every changed file.
    ///
    /// All files are re-checked against the hash taken at read time before
    /// the first write, so a concurrent edit aborts the commit with nothing
    /// written. Each write is atomic (tempfile + fsync + rename).
    pub fn commit(self) -> Result<Vec<PathBuf>, EditError> {
        let pending: Vec<(&PathBuf, &StagedFile)> = self
            .files
            .iter()
            .filter(|(_, staged)| staged.original != staged.current)
            .collect();

        for (path, staged) in &pending {
            let canonical = self.guard.validate_path(path)?;
            let on_disk = fs::read(&canonical).map_err(|source| EditError::Io {
                path: canonical.clone(),
                source,
            })?;
            if xxh3_64(&on_disk) != staged.original_hash {
                return Err(EditError::ConcurrentModification { path: canonical });
            }
        }

        let mut written = Vec::with_capacity(pending.len());
        for (path, staged) in pending {
            atomic_write(path, staged.current.as_bytes())?;

            // Update mtime so Gradle's up-to-date checks notice the change
            let now = filetime::FileTime::now();
            filetime::set_file_mtime(path, now).map_err(|source| EditError::Io {
                path: path.clone(),
                source,
            })?;

            tracing::info!(file = %path.display(), "wrote patched file");
            written.push(path.clone());
        }

        Ok(written)
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// The original file's permissions are carried over to the replacement.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let io_err = |source: std::io::Error| EditError::Io {
        path: path.to_path_buf(),
        source,
    };

    // Create tempfile in same directory to ensure same filesystem
    let parent = path.parent().ok_or_else(|| {
        io_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let permissions = fs::metadata(path).map_err(io_err)?.permissions();
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;

    temp.write_all(content).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    fs::set_permissions(temp.path(), permissions).map_err(io_err)?;

    temp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with(name: &str, content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(name);
        fs::write(&file, content).unwrap();
        (dir, file)
    }

    #[test]
    fn test_staged_content_chains() {
        let (dir, file) = project_with("App.js", "one");
        let mut changeset = Changeset::new(ProjectGuard::new(dir.path()).unwrap());

        let (key, content) = changeset.read(&file).unwrap();
        assert_eq!(content, "one");
        changeset.stage(&key, "two".to_string());

        let (_, content) = changeset.read(Path::new("App.js")).unwrap();
        assert_eq!(content, "two");
        assert_eq!(fs::read_to_string(&file).unwrap(), "one");
    }

    #[test]
    fn test_commit_writes_only_changes() {
        let (dir, file) = project_with("App.js", "one");
        fs::write(dir.path().join("index.js"), "same").unwrap();
        let mut changeset = Changeset::new(ProjectGuard::new(dir.path()).unwrap());

        let (key, _) = changeset.read(&file).unwrap();
        changeset.stage(&key, "two".to_string());
        let (same, content) = changeset.read(&dir.path().join("index.js")).unwrap();
        changeset.stage(&same, content);

        assert_eq!(changeset.changes().count(), 1);
        let written = changeset.commit().unwrap();
        assert_eq!(written, vec![key]);
        assert_eq!(fs::read_to_string(&file).unwrap(), "two");
    }

    #[test]
    fn test_commit_detects_concurrent_modification() {
        let (dir, file) = project_with("App.js", "one");
        let mut changeset = Changeset::new(ProjectGuard::new(dir.path()).unwrap());

        let (key, _) = changeset.read(&file).unwrap();
        changeset.stage(&key, "two".to_string());
        fs::write(&file, "edited elsewhere").unwrap();

        let result = changeset.commit();
        assert!(matches!(
            result,
            Err(EditError::ConcurrentModification { .. })
        ));
        assert_eq!(fs::read_to_string(&file).unwrap(), "edited elsewhere");
    }

    #[test]
    fn test_non_utf8_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gradle.properties");
        fs::write(&file, [0xff, 0xfe, 0x00]).unwrap();
        let mut changeset = Changeset::new(ProjectGuard::new(dir.path()).unwrap());
        assert!(matches!(
            changeset.read(&file),
            Err(EditError::InvalidUtf8 { .. })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_atomic_write_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, file) = project_with("gradlew", "#!/bin/sh\n");
        fs::set_permissions(&file, fs::Permissions::from_mode(0o755)).unwrap();
        let mut changeset = Changeset::new(ProjectGuard::new(dir.path()).unwrap());

        let (key, _) = changeset.read(&file).unwrap();
        changeset.stage(&key, "#!/bin/sh\nexit 0\n".to_string());
        changeset.commit().unwrap();

        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
