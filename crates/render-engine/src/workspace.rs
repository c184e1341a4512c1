//! Per-job scratch directories.

use std::path::{Path, PathBuf};

use clipgrid_common::error::MediaResult;

/// Scratch directory owned by one job. Removed when dropped, on success and
/// failure alike.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: tempfile::TempDir,
}

impl JobWorkspace {
    /// Create a workspace under the system temp directory.
    pub fn new() -> MediaResult<Self> {
        let dir = tempfile::Builder::new().prefix("clipgrid-").tempdir()?;
        tracing::debug!(path = %dir.path().display(), "Created job workspace");
        Ok(Self { dir })
    }

    /// Create a workspace under `parent`.
    pub fn new_in(parent: &Path) -> MediaResult<Self> {
        let dir = tempfile::Builder::new().prefix("clipgrid-").tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a scratch file.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Move a finished artifact to its destination.
///
/// Falls back to copy-and-delete when a rename is not possible, e.g. across
/// filesystems.
pub fn promote(src: &Path, dest: &Path) -> MediaResult<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    if let Err(err) = std::fs::rename(src, dest) {
        tracing::debug!(
            error = %err,
            src = %src.display(),
            dest = %dest.display(),
            "Rename failed, copying instead"
        );
        std::fs::copy(src, dest)?;
        std::fs::remove_file(src)?;
    }
    Ok(())
}

/// Move several artifacts as a unit. When one move fails, the artifacts
/// already moved are removed from their destinations before the error is
/// returned.
pub fn promote_all(moves: &[(PathBuf, PathBuf)]) -> MediaResult<()> {
    for (i, (src, dest)) in moves.iter().enumerate() {
        if let Err(err) = promote(src, dest) {
            for (_, moved) in &moves[..i] {
                if let Err(e) = std::fs::remove_file(moved) {
                    tracing::warn!(
                        error = %e,
                        path = %moved.display(),
                        "Failed to remove promoted artifact"
                    );
                }
            }
            return Err(err);
        }
    }
    Ok(())
}

/// Size of a file in bytes.
pub fn file_size(path: &Path) -> MediaResult<u64> {
    Ok(std::fs::metadata(path)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::new_in(root.path()).unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(ws.file("cell_0.mp4"), b"x").unwrap();
        assert!(path.exists());
        drop(ws);
        assert!(!path.exists());
    }

    #[test]
    fn promote_moves_into_new_directory() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("a.mp4");
        std::fs::write(&src, b"abc").unwrap();
        let dest = root.path().join("out").join("b.mp4");

        promote(&src, &dest).unwrap();
        assert!(!src.exists());
        assert_eq!(file_size(&dest).unwrap(), 3);
    }

    #[test]
    fn failed_batch_promotion_removes_moved_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        let first = root.path().join("chunk_001.webm");
        std::fs::write(&first, b"abc").unwrap();
        let moves = vec![
            (first, out.join("chunk_001.webm")),
            (root.path().join("missing.webm"), out.join("chunk_002.webm")),
        ];

        assert!(promote_all(&moves).is_err());
        assert!(!out.join("chunk_001.webm").exists());
        assert!(!out.join("chunk_002.webm").exists());
    }

    #[test]
    fn batch_promotion_moves_everything() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        let moves: Vec<_> = (1..=2)
            .map(|i| {
                let src = root.path().join(format!("chunk_{i}.mp4"));
                std::fs::write(&src, b"x").unwrap();
                (src, out.join(format!("chunk_{i}.mp4")))
            })
            .collect();

        promote_all(&moves).unwrap();
        assert!(moves.iter().all(|(src, dest)| !src.exists() && dest.exists()));
    }
}
