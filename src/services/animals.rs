use std::path::Path;
use tracing::{info, warn};

use super::{ANIMALS_COLLECTION, ANIMALS_FILE, ITEMS_FILE, MirrorCoordinator, OpError};
use crate::assets::{AssetStore, IncomingUpload, validate_upload};
use crate::models::{AnimalRecord, AnimalsDocument, DropRule, ItemsDocument, utc_now};
use crate::storage::{DocumentStore, repo};

/// Normalized mutation input for an animal, as handed over by the request
/// decoding layer. `None` fields were not part of the request.
#[derive(Debug, Default)]
pub struct AnimalFields {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub drop_set_ids: Option<Vec<String>>,
    pub drops: Option<Vec<DropRule>>,
    pub image: Option<IncomingUpload>,
    pub image_label: String,
}

/// Result of a create or update. `warning` is set when the primary write
/// succeeded but the mirror could not be fully synchronized.
#[derive(Debug)]
pub struct AnimalWrite {
    pub animal: AnimalRecord,
    pub warning: Option<String>,
}

#[derive(Debug)]
pub struct AnimalDelete {
    pub deleted: String,
    pub warning: Option<String>,
}

/// Animal CRUD over the animals document, with every mutation mirrored
/// into the items document. The animals document is always saved first:
/// if the process dies between the two saves, the animal is the durable
/// source of truth and the mirror is merely stale until the next update.
pub struct AnimalService {
    store: DocumentStore<AnimalsDocument>,
    items_store: DocumentStore<ItemsDocument>,
    assets: AssetStore,
}

impl AnimalService {
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        let root = data_root.as_ref();
        Self {
            store: DocumentStore::new(root.join(ANIMALS_COLLECTION).join(ANIMALS_FILE)),
            items_store: DocumentStore::new(root.join(super::ITEMS_COLLECTION).join(ITEMS_FILE)),
            assets: AssetStore::new(root),
        }
    }

    pub async fn list(&self) -> Result<Vec<AnimalRecord>, OpError> {
        Ok(self.store.load().await?.animals)
    }

    pub async fn create(&self, fields: AnimalFields) -> Result<AnimalWrite, OpError> {
        let name = fields.name.as_deref().unwrap_or("").trim().to_string();
        if name.is_empty() {
            return Err(OpError::validation("name is required"));
        }
        if let Some(upload) = &fields.image {
            validate_upload(upload)?;
        }

        let mut doc = self.store.load().await?;
        let id = repo::unique_id(&doc.animals, &name, "animal");

        let image = match &fields.image {
            Some(upload) => {
                let layout = self.assets.resolve_layout(ANIMALS_COLLECTION, &id).await?;
                Some(
                    self.assets
                        .save_upload(upload, &layout, "image", &fields.image_label)
                        .await?,
                )
            }
            None => None,
        };

        let now = utc_now();
        let animal = AnimalRecord {
            id,
            name,
            notes: fields.notes.unwrap_or_default().trim().to_string(),
            image,
            drop_set_ids: fields.drop_set_ids.unwrap_or_default(),
            drops: fields.drops.unwrap_or_default(),
            created_at: now.clone(),
            updated_at: now,
        };
        doc.animals.push(animal.clone());
        self.store.save(&mut doc).await?;
        info!(id = %animal.id, name = %animal.name, "created animal");

        let warning = self.sync_mirror(&animal, animal.image.is_some()).await;
        Ok(AnimalWrite { animal, warning })
    }

    pub async fn update(&self, id: &str, fields: AnimalFields) -> Result<AnimalWrite, OpError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(OpError::validation("id is required"));
        }
        if let Some(upload) = &fields.image {
            validate_upload(upload)?;
        }

        let mut doc = self.store.load().await?;
        let index = repo::find_index(&doc.animals, id)
            .ok_or_else(|| OpError::not_found("animal not found"))?;

        let mut changed = false;
        {
            let animal = &mut doc.animals[index];
            if let Some(name) = fields.name {
                animal.name = name.trim().to_string();
                changed = true;
            }
            if let Some(notes) = fields.notes {
                animal.notes = notes.trim().to_string();
                changed = true;
            }
            if let Some(drop_set_ids) = fields.drop_set_ids {
                animal.drop_set_ids = drop_set_ids;
                changed = true;
            }
            if let Some(drops) = fields.drops {
                animal.drops = drops;
                changed = true;
            }
        }

        let image_changed = fields.image.is_some();
        if let Some(upload) = &fields.image {
            let layout = self.assets.resolve_layout(ANIMALS_COLLECTION, id).await?;
            let new_image = self
                .assets
                .save_upload(upload, &layout, "image", &fields.image_label)
                .await?;
            // A same-extension replace lands on the same path; only unlink
            // the old file when it is actually a different one.
            if let Some(old) = doc.animals[index].image.replace(new_image) {
                let keep = doc.animals[index]
                    .image
                    .as_ref()
                    .is_some_and(|new| new.path == old.path);
                if !keep {
                    self.assets.delete_asset(&old.path).await;
                }
            }
            changed = true;
        }

        if changed {
            doc.animals[index].updated_at = utc_now();
            self.store.save(&mut doc).await?;
        }
        let animal = doc.animals[index].clone();

        let warning = self.sync_mirror(&animal, image_changed).await;
        Ok(AnimalWrite { animal, warning })
    }

    pub async fn delete(&self, id: &str) -> Result<AnimalDelete, OpError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(OpError::validation("id is required"));
        }

        let mut doc = self.store.load().await?;
        let index = repo::find_index(&doc.animals, id)
            .ok_or_else(|| OpError::not_found("animal not found"))?;

        self.assets.remove_entity_dir(ANIMALS_COLLECTION, id).await;
        doc.animals.remove(index);
        self.store.save(&mut doc).await?;
        info!(id, "deleted animal");

        let warning = match self.items_store.load().await {
            Err(error) => {
                warn!(%error, "items document unavailable during delete");
                Some(format!("mirror not removed: {error}"))
            }
            Ok(mut items) => {
                let coordinator = MirrorCoordinator::new(&self.assets);
                if coordinator.retire(id, &mut items).await {
                    match self.items_store.save(&mut items).await {
                        Ok(()) => None,
                        Err(error) => {
                            warn!(%error, "items document save failed after animals save");
                            Some(format!("mirror not removed: {error}"))
                        }
                    }
                } else {
                    // Pre-existing inconsistency: the delete still succeeds.
                    None
                }
            }
        };
        Ok(AnimalDelete {
            deleted: id.to_string(),
            warning,
        })
    }

    /// Projects `animal` into the items document and persists it. The
    /// animals document is already durable at this point, so any failure
    /// here degrades the result instead of failing the operation.
    async fn sync_mirror(&self, animal: &AnimalRecord, image_changed: bool) -> Option<String> {
        let mut items = match self.items_store.load().await {
            Ok(items) => items,
            Err(error) => {
                warn!(%error, "items document unavailable, mirror skipped");
                return Some(format!("mirror not updated: {error}"));
            }
        };

        let coordinator = MirrorCoordinator::new(&self.assets);
        let mut warning = coordinator.project(animal, &mut items, image_changed).await;

        if let Err(error) = self.items_store.save(&mut items).await {
            warn!(%error, "items document save failed after animals save");
            warning = Some(format!("mirror not persisted: {error}"));
        }
        warning
    }
}
