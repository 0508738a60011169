use std::{
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use uuid::Uuid;

pub(crate) type ArcTmpDir = Arc<TmpDir>;

/// Root scratch arena for the whole process.
///
/// Every submission gets its own uuid-named directory underneath, so two
/// concurrent submissions from the same owner can never collide on a path.
#[derive(Debug)]
pub(crate) struct TmpDir {
    path: Option<PathBuf>,
}

impl TmpDir {
    pub(crate) async fn init<P: AsRef<Path>>(path: P) -> std::io::Result<Arc<Self>> {
        let path = path.as_ref().join(Uuid::now_v7().to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Arc::new(TmpDir { path: Some(path) }))
    }

    pub(crate) fn path(&self) -> &Path {
        self.path.as_deref().expect("tmp path exists")
    }

    pub(crate) async fn scratch_dir(&self) -> std::io::Result<ScratchDir> {
        let path = self.path().join(Uuid::now_v7().to_string());
        tokio::fs::create_dir(&path).await?;
        Ok(ScratchDir { path: Some(path) })
    }

    pub(crate) async fn cleanup(self: Arc<Self>) -> std::io::Result<()> {
        if let Some(path) = Arc::into_inner(self).and_then(|mut this| this.path.take()) {
            tokio::fs::remove_dir_all(path).await?;
        }

        Ok(())
    }
}

impl Drop for TmpDir {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_dir_all(path);
        }
    }
}

/// Submission-scoped scratch directory.
///
/// Removed as a whole on every exit path of a submission's processing
/// sequence, either through [`ScratchDir::cleanup`] or through `Drop`.
#[must_use]
#[derive(Debug)]
pub(crate) struct ScratchDir {
    path: Option<PathBuf>,
}

impl ScratchDir {
    pub(crate) fn file(&self, ext: Option<&str>) -> PathBuf {
        let name = if let Some(ext) = ext {
            format!("{}{}", Uuid::now_v7(), ext)
        } else {
            Uuid::now_v7().to_string()
        };

        self.path.as_deref().expect("scratch path exists").join(name)
    }

    pub(crate) async fn cleanup(mut self) -> std::io::Result<()> {
        if let Some(path) = self.path.take() {
            tokio::fs::remove_dir_all(path).await?;
        }

        Ok(())
    }
}

impl AsRef<Path> for ScratchDir {
    fn as_ref(&self) -> &Path {
        self.path.as_deref().expect("scratch path exists")
    }
}

impl Deref for ScratchDir {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path.as_deref().expect("scratch path exists")
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_dir_all(path);
        }
    }
}
