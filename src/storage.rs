use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

/// URL prefix under which stored files are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Storage for uploaded binary assets, addressed by root-relative public paths
/// such as `/uploads/products/<name>.png`.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Writes `body` as `<folder>/<file_name>` and returns its public path.
    async fn save(&self, folder: &str, file_name: &str, body: Bytes) -> anyhow::Result<String>;
    /// Removes the file behind `path`. A file that is already gone is not an error.
    async fn delete(&self, path: &str) -> anyhow::Result<()>;
    async fn exists(&self, path: &str) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root and the given sub-folders.
    pub async fn ensure_folders(&self, folders: &[&str]) -> anyhow::Result<()> {
        for folder in folders {
            let dir = self.root.join(single_component(folder)?);
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("create uploads dir {}", dir.display()))?;
        }
        Ok(())
    }

    fn resolve(&self, public_path: &str) -> anyhow::Result<PathBuf> {
        let rel = public_path
            .strip_prefix(PUBLIC_PREFIX)
            .and_then(|p| p.strip_prefix('/'))
            .ok_or_else(|| anyhow::anyhow!("{public_path} is outside the uploads tree"))?;
        let rel = Path::new(rel);
        let mut components = rel.components().peekable();
        anyhow::ensure!(
            components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_))),
            "{public_path} is not a plain uploads path"
        );
        Ok(self.root.join(rel))
    }
}

fn single_component(name: &str) -> anyhow::Result<&Path> {
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => anyhow::bail!("invalid path segment {name:?}"),
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, folder: &str, file_name: &str, body: Bytes) -> anyhow::Result<String> {
        let dir = self.root.join(single_component(folder)?);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create dir {}", dir.display()))?;

        let target = dir.join(single_component(file_name)?);
        tokio::fs::write(&target, &body)
            .await
            .with_context(|| format!("write {}", target.display()))?;

        debug!(path = %target.display(), bytes = body.len(), "file stored");
        Ok(format!("{PUBLIC_PREFIX}/{folder}/{file_name}"))
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path = %target.display(), "file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", target.display())),
        }
    }

    async fn exists(&self, path: &str) -> anyhow::Result<bool> {
        let target = self.resolve(path)?;
        tokio::fs::try_exists(&target)
            .await
            .with_context(|| format!("stat {}", target.display()))
    }
}
