use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

use super::{FieldUpdate, ITEMS_COLLECTION, ITEMS_FILE, OpError};
use crate::assets::{AssetStore, IncomingUpload, validate_upload};
use crate::models::item::{ANIMAL_CATEGORY, INTERACTIVE_CATEGORY};
use crate::models::{
    Category, CreaturePayload, DropRule, ItemRecord, ItemsDocument, UiPayload, UiScreen, utc_now,
};
use crate::storage::{DocumentStore, repo};

/// Normalized mutation input for an item. `None`/`Absent` fields were not
/// part of the request.
#[derive(Debug, Default)]
pub struct ItemFields {
    pub name: Option<String>,
    pub category_id: Option<String>,
    pub notes: Option<String>,
    pub terrains: Option<Vec<String>>,
    pub drop_set_ids: Option<Vec<String>>,
    pub drops: Option<Vec<DropRule>>,
    pub creature: FieldUpdate<CreaturePayload>,
    pub ai: FieldUpdate<Value>,
    pub remove_image: bool,
    pub image: Option<IncomingUpload>,
    pub image_label: Option<String>,
    pub screen: Option<IncomingUpload>,
    pub screen_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsListing {
    pub items: Vec<ItemRecord>,
    pub categories: Vec<Category>,
}

#[derive(Debug)]
pub struct ItemWrite {
    pub item: ItemRecord,
}

#[derive(Debug)]
pub struct ItemDelete {
    pub deleted: String,
}

/// Item CRUD over the items document, including the category-conditional
/// payloads: `creature`/`ai` for animal-category items, `ui.screens` for
/// interactive ones.
pub struct ItemService {
    store: DocumentStore<ItemsDocument>,
    assets: AssetStore,
}

impl ItemService {
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        let root = data_root.as_ref();
        Self {
            store: DocumentStore::new(root.join(ITEMS_COLLECTION).join(ITEMS_FILE)),
            assets: AssetStore::new(root),
        }
    }

    pub async fn list(&self) -> Result<ItemsListing, OpError> {
        let mut doc = self.store.load().await?;
        doc.bootstrap();
        Ok(ItemsListing {
            items: doc.items,
            categories: doc.categories,
        })
    }

    pub async fn create(&self, fields: ItemFields) -> Result<ItemWrite, OpError> {
        let name = fields.name.as_deref().unwrap_or("").trim().to_string();
        if name.is_empty() {
            return Err(OpError::validation("name is required"));
        }
        let category_id = fields
            .category_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("material")
            .to_string();
        if let Some(upload) = &fields.image {
            validate_upload(upload)?;
        }
        if let Some(upload) = &fields.screen {
            validate_upload(upload)?;
        }

        let mut doc = self.store.load().await?;
        doc.bootstrap();
        let id = repo::unique_id(&doc.items, &name, "item");

        // One layout decision covers every asset this operation writes.
        let layout = if fields.image.is_some() || fields.screen.is_some() {
            Some(self.assets.resolve_layout(ITEMS_COLLECTION, &id).await?)
        } else {
            None
        };

        let image = match (&fields.image, &layout) {
            (Some(upload), Some(layout)) => Some(
                self.assets
                    .save_upload(
                        upload,
                        layout,
                        "image",
                        fields.image_label.as_deref().unwrap_or(""),
                    )
                    .await?,
            ),
            _ => None,
        };

        let creature = reconcile_creature(&category_id, fields.creature, None);
        let ai = reconcile_ai(&category_id, fields.ai, None);
        let mut ui = (category_id == INTERACTIVE_CATEGORY).then(UiPayload::default);
        if let (Some(upload), Some(layout), Some(ui)) = (&fields.screen, &layout, ui.as_mut()) {
            let image = self
                .assets
                .save_upload(upload, layout, &screen_stem(), "")
                .await?;
            ui.screens.push(UiScreen {
                name: screen_name_or_default(&fields.screen_name, ui.screens.len()),
                image,
            });
        }

        let now = utc_now();
        let item = ItemRecord {
            id,
            linked_animal_id: None,
            name,
            category_id,
            notes: fields.notes.unwrap_or_default().trim().to_string(),
            terrains: fields.terrains.unwrap_or_default(),
            image,
            drop_set_ids: fields.drop_set_ids.unwrap_or_default(),
            drops: fields.drops.unwrap_or_default(),
            creature,
            ai,
            ui,
            created_at: now.clone(),
            updated_at: now,
        };
        doc.items.push(item.clone());
        self.store.save(&mut doc).await?;
        info!(id = %item.id, category = %item.category_id, "created item");

        Ok(ItemWrite { item })
    }

    pub async fn update(&self, id: &str, fields: ItemFields) -> Result<ItemWrite, OpError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(OpError::validation("id is required"));
        }
        if let Some(upload) = &fields.image {
            validate_upload(upload)?;
        }
        if let Some(upload) = &fields.screen {
            validate_upload(upload)?;
        }

        let mut doc = self.store.load().await?;
        doc.bootstrap();
        let index =
            repo::find_index(&doc.items, id).ok_or_else(|| OpError::not_found("item not found"))?;

        let mut changed = false;
        {
            let item = &mut doc.items[index];
            if let Some(name) = fields.name {
                item.name = name.trim().to_string();
                changed = true;
            }
            if let Some(category_id) = fields.category_id {
                item.category_id = category_id.trim().to_string();
                changed = true;
            }
            if let Some(notes) = fields.notes {
                item.notes = notes.trim().to_string();
                changed = true;
            }
            if let Some(terrains) = fields.terrains {
                item.terrains = terrains;
                changed = true;
            }
            if let Some(drop_set_ids) = fields.drop_set_ids {
                item.drop_set_ids = drop_set_ids;
                changed = true;
            }
            if let Some(drops) = fields.drops {
                item.drops = drops;
                changed = true;
            }
        }

        // Reconcile the category-conditional payloads against the final
        // category, whether or not it changed in this request.
        let category = doc.items[index].category_id.clone();
        {
            let item = &mut doc.items[index];

            let creature_present = !fields.creature.is_absent();
            let current_creature = item.creature.take();
            let next_creature =
                reconcile_creature(&category, fields.creature, current_creature.clone());
            if creature_present || next_creature != current_creature {
                changed = true;
            }
            item.creature = next_creature;

            let ai_present = !fields.ai.is_absent();
            let current_ai = item.ai.take();
            let next_ai = reconcile_ai(&category, fields.ai, current_ai.clone());
            if ai_present || next_ai != current_ai {
                changed = true;
            }
            item.ai = next_ai;

            if category == INTERACTIVE_CATEGORY {
                if item.ui.is_none() {
                    item.ui = Some(UiPayload::default());
                    changed = true;
                }
            } else if item.ui.take().is_some() {
                changed = true;
            }
        }

        let layout = if fields.image.is_some() || fields.screen.is_some() {
            Some(self.assets.resolve_layout(ITEMS_COLLECTION, id).await?)
        } else {
            None
        };

        if let (Some(upload), Some(layout)) = (&fields.image, &layout) {
            let label = fields.image_label.clone().unwrap_or_else(|| {
                doc.items[index]
                    .image
                    .as_ref()
                    .map(|img| img.label.clone())
                    .unwrap_or_default()
            });
            let new_image = self
                .assets
                .save_upload(upload, layout, "image", &label)
                .await?;
            if let Some(old) = doc.items[index].image.replace(new_image) {
                let keep = doc.items[index]
                    .image
                    .as_ref()
                    .is_some_and(|new| new.path == old.path);
                if !keep {
                    self.assets.delete_asset(&old.path).await;
                }
            }
            changed = true;
        }

        if fields.remove_image {
            if let Some(old) = doc.items[index].image.take() {
                self.assets.delete_asset(&old.path).await;
            }
            changed = true;
        }

        if let (Some(upload), Some(layout)) = (&fields.screen, &layout) {
            if let Some(ui) = doc.items[index].ui.as_mut() {
                let image = self
                    .assets
                    .save_upload(upload, layout, &screen_stem(), "")
                    .await?;
                ui.screens.push(UiScreen {
                    name: screen_name_or_default(&fields.screen_name, ui.screens.len()),
                    image,
                });
                changed = true;
            }
        }

        if changed {
            doc.items[index].updated_at = utc_now();
            self.store.save(&mut doc).await?;
        }
        Ok(ItemWrite {
            item: doc.items[index].clone(),
        })
    }

    pub async fn delete(&self, id: &str) -> Result<ItemDelete, OpError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(OpError::validation("id is required"));
        }

        let mut doc = self.store.load().await?;
        doc.bootstrap();
        let index =
            repo::find_index(&doc.items, id).ok_or_else(|| OpError::not_found("item not found"))?;

        if let Some(image) = &doc.items[index].image {
            self.assets.delete_asset(&image.path).await;
        }
        self.assets.remove_entity_dir(ITEMS_COLLECTION, id).await;
        doc.items.remove(index);
        self.store.save(&mut doc).await?;
        info!(id, "deleted item");

        Ok(ItemDelete {
            deleted: id.to_string(),
        })
    }
}

/// Creature payload rules: an animal-category item always carries one (a
/// default when nothing usable was supplied); other categories only keep
/// an explicitly supplied payload.
fn reconcile_creature(
    category_id: &str,
    update: FieldUpdate<CreaturePayload>,
    current: Option<CreaturePayload>,
) -> Option<CreaturePayload> {
    if category_id == ANIMAL_CATEGORY {
        match update {
            FieldUpdate::Set(payload) => Some(payload),
            FieldUpdate::Clear => Some(CreaturePayload::default()),
            FieldUpdate::Absent => current.or_else(|| Some(CreaturePayload::default())),
        }
    } else {
        match update {
            FieldUpdate::Set(payload) => Some(payload),
            FieldUpdate::Clear | FieldUpdate::Absent => None,
        }
    }
}

/// The `ai` payload is opaque and only meaningful on animal-category items.
fn reconcile_ai(
    category_id: &str,
    update: FieldUpdate<Value>,
    current: Option<Value>,
) -> Option<Value> {
    if category_id == ANIMAL_CATEGORY {
        match update {
            FieldUpdate::Set(payload) => Some(payload),
            FieldUpdate::Clear => None,
            FieldUpdate::Absent => current,
        }
    } else {
        None
    }
}

fn screen_stem() -> String {
    format!("screen_{}", crate::storage::short_token())
}

fn screen_name_or_default(name: &str, existing: usize) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        format!("Screen {}", existing + 1)
    } else {
        trimmed.to_string()
    }
}
