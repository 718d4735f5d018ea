use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::models::{ImageRef, utc_now};
use crate::storage::document::{StorageError, relax_file_permissions};
use crate::storage::{ensure_dir, short_token};

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("image upload error: {0}")]
    Upload(String),

    #[error("image too large ({size} bytes, limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("invalid image extension: {0:?}")]
    InvalidExtension(String),

    #[error("failed to store image at {}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file handed over by the upload-receiving layer: already spooled to a
/// temporary path, with the declared size and any receive-side error.
#[derive(Debug, Clone)]
pub struct IncomingUpload {
    pub filename: String,
    pub temp_path: PathBuf,
    pub size: u64,
    pub error: Option<String>,
}

/// Checks the receive-side error code, the size cap, and the extension
/// whitelist. Returns the lowercased extension so callers can reuse it.
pub fn validate_upload(upload: &IncomingUpload) -> Result<String, AssetError> {
    if let Some(error) = &upload.error {
        return Err(AssetError::Upload(error.clone()));
    }
    if upload.size > MAX_UPLOAD_BYTES {
        return Err(AssetError::TooLarge {
            size: upload.size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    let extension = Path::new(&upload.filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AssetError::InvalidExtension(extension));
    }
    Ok(extension)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayoutMode {
    /// The entity owns a dedicated subdirectory; files get stable names.
    Subdir,
    /// The subdirectory could not be created; files live directly in the
    /// collection directory under collision-resistant names.
    Flat,
}

/// Where an entity's assets land, decided once per operation and threaded
/// through every write that operation performs (including mirror writes).
#[derive(Debug, Clone)]
pub struct AssetLayout {
    collection: String,
    entity_id: String,
    dir: PathBuf,
    mode: LayoutMode,
}

impl AssetLayout {
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.mode == LayoutMode::Flat
    }

    fn filename(&self, stem: &str, extension: &str) -> String {
        match self.mode {
            LayoutMode::Subdir => format!("{stem}.{extension}"),
            LayoutMode::Flat => format!("{}_{}.{extension}", self.entity_id, short_token()),
        }
    }

    fn relative(&self, filename: &str) -> String {
        match self.mode {
            LayoutMode::Subdir => format!("{}/{}/{filename}", self.collection, self.entity_id),
            LayoutMode::Flat => format!("{}/{filename}", self.collection),
        }
    }
}

/// Places, copies, and deletes image files under the data root.
#[derive(Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn entity_dir(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection).join(id)
    }

    /// Decides the layout for one entity's writes: a dedicated subdirectory
    /// when it can be created, otherwise the flat fallback (which requires
    /// the collection directory to exist).
    pub async fn resolve_layout(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<AssetLayout, StorageError> {
        let dir = self.entity_dir(collection, id);
        if ensure_dir(&dir, false).await? {
            return Ok(AssetLayout {
                collection: collection.to_string(),
                entity_id: id.to_string(),
                dir,
                mode: LayoutMode::Subdir,
            });
        }
        let dir = self.collection_dir(collection);
        ensure_dir(&dir, true).await?;
        warn!(collection, id, "entity directory unavailable, using flat layout");
        Ok(AssetLayout {
            collection: collection.to_string(),
            entity_id: id.to_string(),
            dir,
            mode: LayoutMode::Flat,
        })
    }

    /// Validates and moves a received upload into place.
    pub async fn save_upload(
        &self,
        upload: &IncomingUpload,
        layout: &AssetLayout,
        stem: &str,
        label: &str,
    ) -> Result<ImageRef, AssetError> {
        let extension = validate_upload(upload)?;
        let filename = layout.filename(stem, &extension);
        let dest = layout.dir.join(&filename);

        move_file(&upload.temp_path, &dest)
            .await
            .map_err(|source| AssetError::Store {
                path: dest.clone(),
                source,
            })?;
        relax_file_permissions(&dest).await;
        info!(path = %dest.display(), size = upload.size, "stored uploaded image");

        Ok(ImageRef {
            path: layout.relative(&filename),
            filename,
            label: label.to_string(),
            uploaded_at: utc_now(),
        })
    }

    /// Duplicates an already-validated asset (by data-root-relative path)
    /// into another entity's layout, preserving the extension.
    pub async fn copy_asset(
        &self,
        src_relative: &str,
        layout: &AssetLayout,
        stem: &str,
        label: &str,
    ) -> Result<ImageRef, AssetError> {
        let src = self.absolute(src_relative);
        let extension = src
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let filename = layout.filename(stem, &extension);
        let dest = layout.dir.join(&filename);

        fs::copy(&src, &dest)
            .await
            .map_err(|source| AssetError::Store {
                path: dest.clone(),
                source,
            })?;
        relax_file_permissions(&dest).await;
        debug!(from = %src.display(), to = %dest.display(), "copied asset");

        Ok(ImageRef {
            path: layout.relative(&filename),
            filename,
            label: label.to_string(),
            uploaded_at: utc_now(),
        })
    }

    /// Best-effort unlink. A missing file is not a failure, and nothing
    /// here ever reaches the caller.
    pub async fn delete_asset(&self, relative: &str) {
        if relative.is_empty() {
            return;
        }
        let path = self.absolute(relative);
        match fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "deleted asset"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => debug!(path = %path.display(), %error, "asset delete failed"),
        }
    }

    /// Removes every file in an entity's subdirectory and the directory
    /// itself, best-effort.
    pub async fn remove_entity_dir(&self, collection: &str, id: &str) {
        let dir = self.entity_dir(collection, id);
        let Ok(mut entries) = fs::read_dir(&dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_file() {
                let _ = fs::remove_file(&path).await;
            }
        }
        let _ = fs::remove_dir(&dir).await;
        debug!(path = %dir.display(), "removed entity asset directory");
    }
}

/// Moves a spooled upload into place; the spool directory may be on a
/// different filesystem, so fall back to copy-and-remove when rename fails.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    fs::copy(from, to).await?;
    let _ = fs::remove_file(from).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, size: u64) -> IncomingUpload {
        IncomingUpload {
            filename: filename.to_string(),
            temp_path: PathBuf::new(),
            size,
            error: None,
        }
    }

    #[test]
    fn validate_accepts_whitelisted_extensions_case_insensitively() {
        assert_eq!(validate_upload(&upload("fox.PNG", 10)).unwrap(), "png");
        assert_eq!(validate_upload(&upload("fox.webp", 10)).unwrap(), "webp");
    }

    #[test]
    fn validate_rejects_bad_extension() {
        assert!(matches!(
            validate_upload(&upload("fox.svg", 10)),
            Err(AssetError::InvalidExtension(ext)) if ext == "svg"
        ));
        assert!(matches!(
            validate_upload(&upload("no-extension", 10)),
            Err(AssetError::InvalidExtension(ext)) if ext.is_empty()
        ));
    }

    #[test]
    fn validate_rejects_oversized_upload() {
        assert!(matches!(
            validate_upload(&upload("fox.png", MAX_UPLOAD_BYTES + 1)),
            Err(AssetError::TooLarge { .. })
        ));
        assert!(validate_upload(&upload("fox.png", MAX_UPLOAD_BYTES)).is_ok());
    }

    #[test]
    fn validate_reports_receive_side_errors_first() {
        let mut bad = upload("fox.png", 10);
        bad.error = Some("partial upload".to_string());
        assert!(matches!(
            validate_upload(&bad),
            Err(AssetError::Upload(msg)) if msg == "partial upload"
        ));
    }

    #[test]
    fn layout_names_differ_by_mode() {
        let subdir = AssetLayout {
            collection: "Items".to_string(),
            entity_id: "sword_1".to_string(),
            dir: PathBuf::from("/tmp/Items/sword_1"),
            mode: LayoutMode::Subdir,
        };
        assert_eq!(subdir.filename("image", "png"), "image.png");
        assert_eq!(subdir.relative("image.png"), "Items/sword_1/image.png");

        let flat = AssetLayout {
            mode: LayoutMode::Flat,
            dir: PathBuf::from("/tmp/Items"),
            ..subdir
        };
        let name = flat.filename("image", "png");
        assert!(name.starts_with("sword_1_"));
        assert!(name.ends_with(".png"));
        assert_eq!(flat.relative(&name), format!("Items/{name}"));
    }
}
