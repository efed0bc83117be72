//! Renaming documents under a root directory.

use crate::path;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Directory,
}

/// What a manager reports about a document after moving it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Contents {
    pub name: String,
    pub path: String,
    pub kind: ContentKind,
    pub size: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The destination exists (HTTP 409 in server backed managers).
    #[error("409 Conflict: {path} already exists")]
    Conflict { path: String },
    #[error("no such document: {path}")]
    NotFound { path: String },
    #[error("invalid document path: {path}")]
    InvalidPath { path: String },
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DocumentError::Conflict { .. })
    }
}

pub trait DocumentManager {
    /// Move `old_path` to `new_path`, failing with
    /// [`DocumentError::Conflict`] when the destination exists.
    fn rename(&self, old_path: &str, new_path: &str) -> Result<Contents, DocumentError>;
    /// Move `old_path` to `new_path`, replacing whatever is there.
    fn overwrite(&self, old_path: &str, new_path: &str) -> Result<Contents, DocumentError>;
}

/// Documents are files below `root`, addressed by `/` separated relative paths.
#[derive(Clone, Debug)]
pub struct FsDocumentManager {
    root: PathBuf,
}

impl FsDocumentManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, p: &str) -> Result<PathBuf, DocumentError> {
        let rel = Path::new(p);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if p.is_empty() || escapes {
            return Err(DocumentError::InvalidPath { path: p.to_string() });
        }
        Ok(self.root.join(rel))
    }

    fn io_err(p: &str) -> impl FnOnce(std::io::Error) -> DocumentError + '_ {
        move |source| DocumentError::Io {
            path: p.to_string(),
            source,
        }
    }

    fn move_entry(&self, old_path: &str, new_path: &str, replace: bool) -> Result<Contents, DocumentError> {
        let from = self.resolve(old_path)?;
        let to = self.resolve(new_path)?;
        // replacing an ancestor of the source would delete the source with it
        if from.starts_with(&to) || to.starts_with(&from) {
            return Err(DocumentError::InvalidPath {
                path: new_path.to_string(),
            });
        }
        if !from.exists() {
            return Err(DocumentError::NotFound {
                path: old_path.to_string(),
            });
        }
        if to.exists() {
            if !replace {
                return Err(DocumentError::Conflict {
                    path: new_path.to_string(),
                });
            }
            if to.is_dir() {
                fs::remove_dir_all(&to).map_err(Self::io_err(new_path))?;
            } else {
                fs::remove_file(&to).map_err(Self::io_err(new_path))?;
            }
        }
        fs::rename(&from, &to).map_err(Self::io_err(old_path))?;
        let meta = fs::metadata(&to).map_err(Self::io_err(new_path))?;
        let normalized = path::join(&[new_path]);
        tracing::info!(from = old_path, to = %normalized, replace, "document moved");
        Ok(Contents {
            name: path::basename(&normalized).to_string(),
            kind: if meta.is_dir() {
                ContentKind::Directory
            } else {
                ContentKind::File
            },
            size: meta.is_file().then(|| meta.len()),
            path: normalized,
        })
    }
}

impl DocumentManager for FsDocumentManager {
    fn rename(&self, old_path: &str, new_path: &str) -> Result<Contents, DocumentError> {
        self.move_entry(old_path, new_path, false)
    }

    fn overwrite(&self, old_path: &str, new_path: &str) -> Result<Contents, DocumentError> {
        self.move_entry(old_path, new_path, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, FsDocumentManager) {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("docs")).unwrap();
        fs::write(tmp.path().join("docs/notes.md"), "hello").unwrap();
        fs::write(tmp.path().join("docs/taken.md"), "other").unwrap();
        let mgr = FsDocumentManager::new(tmp.path());
        (tmp, mgr)
    }

    #[test]
    fn rename_moves_the_file() {
        let (tmp, mgr) = setup();
        let c = mgr.rename("docs/notes.md", "docs/notes2.md").unwrap();
        assert_eq!(c.name, "notes2.md");
        assert_eq!(c.path, "docs/notes2.md");
        assert_eq!(c.kind, ContentKind::File);
        assert_eq!(c.size, Some(5));
        assert!(!tmp.path().join("docs/notes.md").exists());
    }

    #[test]
    fn existing_destination_is_a_conflict_until_overwritten() {
        let (tmp, mgr) = setup();
        let err = mgr.rename("docs/notes.md", "docs/taken.md").unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().starts_with("409"));
        mgr.overwrite("docs/notes.md", "docs/taken.md").unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("docs/taken.md")).unwrap(), "hello");
    }

    #[test]
    fn missing_source_and_escaping_paths_are_rejected() {
        let (_tmp, mgr) = setup();
        assert!(matches!(
            mgr.rename("docs/none.md", "docs/x.md"),
            Err(DocumentError::NotFound { .. })
        ));
        assert!(matches!(
            mgr.rename("docs/notes.md", "../x.md"),
            Err(DocumentError::InvalidPath { .. })
        ));
        assert!(matches!(
            mgr.rename("/etc/passwd", "x"),
            Err(DocumentError::InvalidPath { .. })
        ));
    }

    #[test]
    fn overwriting_an_ancestor_of_the_source_is_refused() {
        let (tmp, mgr) = setup();
        for dest in ["docs", ".", "docs/.", "docs/notes.md/inner"] {
            assert!(
                matches!(
                    mgr.overwrite("docs/notes.md", dest),
                    Err(DocumentError::InvalidPath { .. })
                ),
                "{dest:?} should be refused"
            );
        }
        assert!(matches!(
            mgr.rename("docs", "docs/sub"),
            Err(DocumentError::InvalidPath { .. })
        ));
        assert_eq!(fs::read_to_string(tmp.path().join("docs/notes.md")).unwrap(), "hello");
        assert!(tmp.path().join("docs/taken.md").exists());
    }
}
