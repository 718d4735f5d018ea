use serde::{Deserialize, Serialize};

use super::drops::DropRule;
use super::image::ImageRef;
use crate::storage::document::{DocumentModel, Metadata};
use crate::storage::repo::Entity;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimalRecord {
    pub id: String,
    pub name: String,
    pub notes: String,
    pub image: Option<ImageRef>,
    pub drop_set_ids: Vec<String>,
    pub drops: Vec<DropRule>,
    pub created_at: String,
    pub updated_at: String,
}

impl Entity for AnimalRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// The persisted animals collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimalsDocument {
    pub animals: Vec<AnimalRecord>,
    pub metadata: Metadata,
}

impl DocumentModel for AnimalsDocument {
    const LIST_KEYS: &'static [&'static str] = &["animals"];

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
