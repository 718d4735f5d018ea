pub mod animals;
pub mod items;
pub mod mirror;

pub use animals::{AnimalDelete, AnimalFields, AnimalService, AnimalWrite};
pub use items::{ItemDelete, ItemFields, ItemService, ItemWrite, ItemsListing};
pub use mirror::{MirrorCoordinator, mirror_item_id};

use thiserror::Error;

use crate::assets::AssetError;
use crate::storage::StorageError;

pub const ANIMALS_COLLECTION: &str = "Animals";
pub const ITEMS_COLLECTION: &str = "Items";
pub const ANIMALS_FILE: &str = "animals.json";
pub const ITEMS_FILE: &str = "items.json";

/// What went wrong with an operation, expressed in the stable kinds the
/// transport layer maps to status codes. Validation and not-found abort
/// before any write; storage failures abort with nothing partially written.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Asset(AssetError),
}

impl OpError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage",
            Self::Asset(error) => match error {
                AssetError::Store { .. } => "storage",
                _ => "validation",
            },
        }
    }
}

impl From<AssetError> for OpError {
    fn from(error: AssetError) -> Self {
        Self::Asset(error)
    }
}

/// Presence-aware form field: the boundary layer distinguishes a field that
/// was not sent from one sent empty (clear) or with a value.
#[derive(Debug, Clone, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Absent,
    Clear,
    Set(T),
}

impl<T> FieldUpdate<T> {
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}
