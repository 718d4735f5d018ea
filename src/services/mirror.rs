use tracing::warn;

use super::ITEMS_COLLECTION;
use crate::assets::AssetStore;
use crate::models::item::ANIMAL_CATEGORY;
use crate::models::{AnimalRecord, CreaturePayload, ItemRecord, ItemsDocument, utc_now};
use crate::storage::repo;

/// Id of the item mirroring a given animal.
#[must_use]
pub fn mirror_item_id(animal_id: &str) -> String {
    format!("animal-{animal_id}")
}

/// Keeps one item record synchronized with each animal record. The mirror
/// is a derived view: anything that fails here degrades the result instead
/// of blocking the animal write that already happened.
pub struct MirrorCoordinator<'a> {
    assets: &'a AssetStore,
}

impl<'a> MirrorCoordinator<'a> {
    #[must_use]
    pub const fn new(assets: &'a AssetStore) -> Self {
        Self { assets }
    }

    /// Upserts the mirror for `animal` into `items`. When `image_changed`
    /// the animal's current image is copied into the item's asset location
    /// and the previous mirror image is deleted only after the copy
    /// succeeded; a failed copy leaves the previous image in place and
    /// returns a warning.
    pub async fn project(
        &self,
        animal: &AnimalRecord,
        items: &mut ItemsDocument,
        image_changed: bool,
    ) -> Option<String> {
        items.bootstrap();

        let item_id = mirror_item_id(&animal.id);
        let previous = repo::find_index(&items.items, &item_id).map(|i| items.items[i].clone());

        let mut warning = None;
        let mut image = previous.as_ref().and_then(|p| p.image.clone());
        if image_changed {
            if let Some(animal_image) = &animal.image {
                match self.copy_mirror_image(&item_id, &animal_image.path, &animal_image.label).await
                {
                    Ok(new_image) => {
                        if let Some(old) = &image {
                            if old.path != new_image.path {
                                self.assets.delete_asset(&old.path).await;
                            }
                        }
                        image = Some(new_image);
                    }
                    Err(message) => {
                        warn!(animal = %animal.id, %message, "mirror image copy failed");
                        warning = Some(format!("mirror image not copied: {message}"));
                    }
                }
            }
        }

        let now = utc_now();
        let record = ItemRecord {
            id: item_id,
            linked_animal_id: Some(animal.id.clone()),
            name: animal.name.clone(),
            category_id: ANIMAL_CATEGORY.to_string(),
            notes: animal.notes.clone(),
            terrains: previous
                .as_ref()
                .map(|p| p.terrains.clone())
                .unwrap_or_default(),
            image,
            drop_set_ids: animal.drop_set_ids.clone(),
            drops: animal.drops.clone(),
            creature: previous
                .as_ref()
                .and_then(|p| p.creature.clone())
                .or_else(|| Some(CreaturePayload::default())),
            ai: previous.as_ref().and_then(|p| p.ai.clone()),
            ui: None,
            created_at: previous
                .map(|p| p.created_at)
                .filter(|stamp| !stamp.is_empty())
                .unwrap_or_else(|| now.clone()),
            updated_at: now,
        };
        repo::upsert_by_id(&mut items.items, record);
        warning
    }

    async fn copy_mirror_image(
        &self,
        item_id: &str,
        src_relative: &str,
        label: &str,
    ) -> Result<crate::models::ImageRef, String> {
        let layout = self
            .assets
            .resolve_layout(ITEMS_COLLECTION, item_id)
            .await
            .map_err(|e| e.to_string())?;
        self.assets
            .copy_asset(src_relative, &layout, "image", label)
            .await
            .map_err(|e| e.to_string())
    }

    /// Removes the mirror for a deleted animal: its image asset, its asset
    /// directory, and the record itself. Returns whether a mirror existed;
    /// absence is not an error.
    pub async fn retire(&self, animal_id: &str, items: &mut ItemsDocument) -> bool {
        let item_id = mirror_item_id(animal_id);
        let Some(index) = repo::find_index(&items.items, &item_id) else {
            return false;
        };
        if let Some(image) = &items.items[index].image {
            self.assets.delete_asset(&image.path).await;
        }
        self.assets.remove_entity_dir(ITEMS_COLLECTION, &item_id).await;
        items.items.remove(index);
        true
    }
}
