use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Extension used when the upload carries no usable one.
const DEFAULT_EXTENSION: &str = "png";

/// Extensions kept from the upload's name. Anything else is stored as png so
/// the static file route never serves markup or scripts.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Error)]
pub enum PictureError {
    #[error("picture I/O failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid picture path: {0}")]
    InvalidPath(String),
}

/// Manages picture files on disk.
///
/// Pictures live flat in `{dir}/{entity_id}_{uuid}.{ext}` and are referenced
/// in the database by their public path, `{public_prefix}{filename}`.
pub struct PictureStore {
    dir: PathBuf,
    public_prefix: String,
}

impl PictureStore {
    pub async fn new(dir: PathBuf, public_prefix: impl Into<String>) -> Result<Self, PictureError> {
        fs::create_dir_all(&dir).await.map_err(|source| PictureError::Io {
            path: dir.clone(),
            source,
        })?;
        info!("Picture storage directory: {}", dir.display());

        let mut public_prefix = public_prefix.into();
        if !public_prefix.ends_with('/') {
            public_prefix.push('/');
        }
        Ok(Self { dir, public_prefix })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Public path under which a stored file is referenced and served.
    pub fn public_path(&self, filename: &str) -> String {
        format!("{}{}", self.public_prefix, filename)
    }

    /// Write `data` to a freshly named file for `entity_id`.
    /// Returns the generated file name (not the full path).
    pub async fn save_picture(
        &self,
        entity_id: i64,
        data: &[u8],
        original_name: Option<&str>,
    ) -> Result<String, PictureError> {
        let filename = format!(
            "{}_{}.{}",
            entity_id,
            Uuid::new_v4().simple(),
            extension_of(original_name)
        );
        let path = self.dir.join(&filename);
        let io_err = |source: std::io::Error| PictureError::Io {
            path: path.clone(),
            source,
        };

        let file = fs::File::create(&path).await.map_err(io_err)?;
        write_or_remove(file, &path, data).await.map_err(io_err)?;

        info!("Saved picture {} ({} bytes)", filename, data.len());
        Ok(filename)
    }

    /// Remove the file behind a public path. A file that is already gone is
    /// not an error.
    pub async fn delete_picture(&self, public_path: &str) -> Result<(), PictureError> {
        let path = self.resolve(public_path)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted picture {}", public_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Picture {} already gone", public_path);
                Ok(())
            }
            Err(source) => Err(PictureError::Io { path, source }),
        }
    }

    /// Map a public path back to a file inside `dir`, rejecting anything
    /// that would escape it.
    fn resolve(&self, public_path: &str) -> Result<PathBuf, PictureError> {
        let filename = public_path
            .strip_prefix(&self.public_prefix)
            .unwrap_or(public_path);

        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename == "."
            || filename == ".."
        {
            return Err(PictureError::InvalidPath(public_path.to_string()));
        }
        Ok(self.dir.join(filename))
    }
}

/// Write `data` through `file`. On failure the file at `path` is removed so
/// no partial picture is left behind.
async fn write_or_remove(mut file: fs::File, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let written = async {
        file.write_all(data).await?;
        file.flush().await
    }
    .await;

    if written.is_err() {
        drop(file);
        if let Err(e) = fs::remove_file(path).await {
            warn!("Failed to remove partial picture {}: {}", path.display(), e);
        }
    }
    written
}

fn extension_of(original_name: Option<&str>) -> String {
    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
