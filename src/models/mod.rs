pub mod animal;
pub mod drops;
pub mod image;
pub mod item;

pub use animal::{AnimalRecord, AnimalsDocument};
pub use drops::{DropRule, DropSource};
pub use image::ImageRef;
pub use item::{
    Category, CreatureAnimation, CreaturePayload, CreatureSkill, Disposition, ItemRecord,
    ItemsDocument, UiPayload, UiScreen,
};

/// Current UTC time as an ISO-8601 string, the format every persisted
/// timestamp uses.
#[must_use]
pub fn utc_now() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
