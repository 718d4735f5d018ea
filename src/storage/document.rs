use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::short_token;
use crate::models::utc_now;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write temporary file {}", path.display())]
    TempWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to replace {}", path.display())]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode document")]
    Encode(#[from] serde_json::Error),
}

/// Document-level metadata stamped on every save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub last_updated: Option<String>,
}

/// A whole persisted collection. `LIST_KEYS` names the JSON keys that must
/// hold arrays (the first is the entity list itself); loading repairs any
/// of them that is missing or mistyped to an empty list.
pub trait DocumentModel: Serialize + DeserializeOwned + Default + Send + Sync {
    const LIST_KEYS: &'static [&'static str];

    fn metadata_mut(&mut self) -> &mut Metadata;
}

/// Loads and atomically saves one JSON document. Saves go through a
/// uniquely-named temporary sibling plus fsync and rename, so a reader can
/// only ever observe the previous complete document or the new one.
pub struct DocumentStore<D> {
    path: PathBuf,
    _model: PhantomData<D>,
}

impl<D: DocumentModel> DocumentStore<D> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _model: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document, seeding an empty one on disk when the file does
    /// not exist yet. Unreadable content is repaired in memory rather than
    /// reported; only an actual read failure is an error.
    pub async fn load(&self) -> Result<D, StorageError> {
        if let Some(parent) = self.path.parent() {
            // Advisory: a read-only deployment can still serve GETs.
            ensure_dir(parent, false).await?;
        }

        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            let seed = D::default();
            if let Ok(json) = serde_json::to_string_pretty(&seed) {
                if fs::write(&self.path, json).await.is_ok() {
                    relax_file_permissions(&self.path).await;
                } else {
                    debug!(path = %self.path.display(), "could not persist seed document");
                }
            }
            return Ok(seed);
        }

        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|source| StorageError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok(Self::parse(&text, &self.path))
    }

    fn parse(text: &str, path: &Path) -> D {
        let Ok(mut value) = serde_json::from_str::<Value>(text) else {
            warn!(path = %path.display(), "document is not valid JSON, starting empty");
            return D::default();
        };
        let Value::Object(map) = &mut value else {
            warn!(path = %path.display(), "document root is not an object, starting empty");
            return D::default();
        };

        for key in D::LIST_KEYS {
            match map.get_mut(*key) {
                Some(Value::Array(entries)) => {
                    let before = entries.len();
                    entries.retain(Value::is_object);
                    if entries.len() < before {
                        warn!(
                            path = %path.display(),
                            key,
                            dropped = before - entries.len(),
                            "dropped malformed entries"
                        );
                    }
                }
                _ => {
                    map.insert((*key).to_string(), Value::Array(Vec::new()));
                }
            }
        }
        if !map.get("metadata").is_some_and(Value::is_object) {
            map.insert(
                "metadata".to_string(),
                serde_json::json!({ "lastUpdated": null }),
            );
        }

        match serde_json::from_value::<D>(value) {
            Ok(document) => document,
            Err(error) => {
                warn!(path = %path.display(), %error, "document did not parse, starting empty");
                D::default()
            }
        }
    }

    /// Stamps `metadata.lastUpdated` and atomically replaces the file. On
    /// any failure the previously saved document is left untouched.
    pub async fn save(&self, document: &mut D) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent, true).await?;
        }

        document.metadata_mut().last_updated = Some(utc_now());
        let json = serde_json::to_string_pretty(document)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self
            .path
            .with_file_name(format!("{file_name}.tmp_{}", short_token()));

        let temp_write = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
            Ok::<(), std::io::Error>(())
        };
        if let Err(source) = temp_write.await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::TempWrite { path: tmp, source });
        }

        if let Err(source) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::Rename {
                path: self.path.clone(),
                source,
            });
        }
        relax_file_permissions(&self.path).await;
        debug!(path = %self.path.display(), "document saved");
        Ok(())
    }
}

/// Creates a directory (and parents) if needed, leaving it world-writable
/// for shared-hosting setups. With `fatal` false a failure just reports
/// `false` so callers can fall back; with `fatal` true it is an error.
pub async fn ensure_dir(path: &Path, fatal: bool) -> Result<bool, StorageError> {
    match fs::create_dir_all(path).await {
        Ok(()) => {
            relax_dir_permissions(path).await;
            Ok(true)
        }
        Err(source) => {
            if fatal {
                Err(StorageError::CreateDir {
                    path: path.to_path_buf(),
                    source,
                })
            } else {
                debug!(path = %path.display(), %source, "directory unavailable");
                Ok(false)
            }
        }
    }
}

pub(crate) async fn relax_file_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, std::fs::Permissions::from_mode(0o666)).await;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

pub(crate) async fn relax_dir_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, std::fs::Permissions::from_mode(0o777)).await;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnimalsDocument;

    #[test]
    fn parse_repairs_non_object_root() {
        let doc = DocumentStore::<AnimalsDocument>::parse("[1,2,3]", Path::new("x.json"));
        assert!(doc.animals.is_empty());
    }

    #[test]
    fn parse_repairs_mistyped_entity_list() {
        let doc = DocumentStore::<AnimalsDocument>::parse(
            r#"{"animals": "oops", "metadata": {"lastUpdated": "2026-01-01T00:00:00Z"}}"#,
            Path::new("x.json"),
        );
        assert!(doc.animals.is_empty());
        assert_eq!(
            doc.metadata.last_updated.as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
    }

    #[test]
    fn parse_drops_junk_entries_but_keeps_records() {
        let doc = DocumentStore::<AnimalsDocument>::parse(
            r#"{"animals": [{"id": "fox_1", "name": "Fox"}, 17, "junk"]}"#,
            Path::new("x.json"),
        );
        assert_eq!(doc.animals.len(), 1);
        assert_eq!(doc.animals[0].id, "fox_1");
    }

    #[test]
    fn parse_rejects_invalid_json() {
        let doc = DocumentStore::<AnimalsDocument>::parse("{not json", Path::new("x.json"));
        assert!(doc.animals.is_empty());
    }
}
