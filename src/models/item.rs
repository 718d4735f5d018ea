use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::drops::DropRule;
use super::image::ImageRef;
use crate::storage::document::{DocumentModel, Metadata};
use crate::storage::repo::Entity;

/// Category ids that must always exist in the items document. The
/// `interactive` category is implicit: it is accepted as a `categoryId`
/// without being seeded.
pub const REQUIRED_CATEGORIES: [(&str, &str); 9] = [
    ("material", "Material"),
    ("weapon", "Weapon"),
    ("armor", "Armor"),
    ("decor", "Decor"),
    ("consumable", "Consumable"),
    ("crop", "Crop"),
    ("mineral", "Mineral"),
    ("tree", "Tree"),
    ("animal", "Animal"),
];

pub const ANIMAL_CATEGORY: &str = "animal";
pub const INTERACTIVE_CATEGORY: &str = "interactive";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Friendly,
    #[default]
    Neutral,
    Hostile,
}

impl Disposition {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "friendly" => Some(Self::Friendly),
            "neutral" => Some(Self::Neutral),
            "hostile" => Some(Self::Hostile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreatureAnimation {
    pub animal_id: String,
    pub clip_name: String,
    pub trigger_chance: f64,
    pub is_idle: bool,
}

impl Default for CreatureAnimation {
    fn default() -> Self {
        Self {
            animal_id: String::new(),
            clip_name: String::new(),
            trigger_chance: 1.0,
            is_idle: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatureSkill {
    pub name: String,
    pub description: String,
}

/// Behavior payload carried by animal-category items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreaturePayload {
    pub disposition: Disposition,
    pub animations: Vec<CreatureAnimation>,
    pub skills: Vec<CreatureSkill>,
}

impl CreaturePayload {
    /// Builds a sanitized payload from loosely-typed JSON: unknown
    /// dispositions fall back to neutral, trigger chances are clamped,
    /// entries with nothing in them are dropped.
    #[must_use]
    pub fn from_value(raw: &Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return Self::default();
        };

        let disposition = obj
            .get("disposition")
            .and_then(Value::as_str)
            .and_then(|s| Disposition::parse(&s.trim().to_lowercase()))
            .unwrap_or_default();

        let animations = obj
            .get("animations")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let anim = entry.as_object()?;
                        let animal_id = string_field(anim.get("animalId"));
                        let clip_name = string_field(anim.get("clipName"));
                        if animal_id.is_empty() && clip_name.is_empty() {
                            return None;
                        }
                        let trigger_chance = anim
                            .get("triggerChance")
                            .and_then(Value::as_f64)
                            .unwrap_or(1.0)
                            .clamp(0.0, 1.0);
                        let is_idle = anim.get("isIdle").is_some_and(bool_like);
                        Some(CreatureAnimation {
                            animal_id,
                            clip_name,
                            trigger_chance,
                            is_idle,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let skills = obj
            .get("skills")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let skill = entry.as_object()?;
                        let name = string_field(skill.get("name"));
                        let description = string_field(skill.get("description"));
                        if name.is_empty() && description.is_empty() {
                            return None;
                        }
                        Some(CreatureSkill { name, description })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            disposition,
            animations,
            skills,
        }
    }

    /// Re-applies the clamping and empty-entry rules to an already-typed
    /// payload (used when normalizing documents read back from disk).
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.animations.retain(|anim| {
            !(anim.animal_id.trim().is_empty() && anim.clip_name.trim().is_empty())
        });
        for anim in &mut self.animations {
            anim.trigger_chance = anim.trigger_chance.clamp(0.0, 1.0);
        }
        self.skills
            .retain(|skill| !(skill.name.trim().is_empty() && skill.description.trim().is_empty()));
        self
    }
}

fn string_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Loose truthiness for form values: accepts bools, numbers, and the usual
/// yes/no string spellings; anything unrecognized is false.
#[must_use]
pub fn bool_like(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        _ => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiScreen {
    pub name: String,
    pub image: ImageRef,
}

/// Screen collection carried by interactive-category items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPayload {
    pub screens: Vec<UiScreen>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemRecord {
    pub id: String,
    /// Present iff this item is the mirror of an animal record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_animal_id: Option<String>,
    pub name: String,
    pub category_id: String,
    pub notes: String,
    pub terrains: Vec<String>,
    pub image: Option<ImageRef>,
    pub drop_set_ids: Vec<String>,
    pub drops: Vec<DropRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creature: Option<CreaturePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiPayload>,
    pub created_at: String,
    pub updated_at: String,
}

impl Entity for ItemRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// The persisted items collection, including its category set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemsDocument {
    pub categories: Vec<Category>,
    pub items: Vec<ItemRecord>,
    pub metadata: Metadata,
}

impl ItemsDocument {
    /// Normalizes the document before use: backfills category labels,
    /// appends any missing required category, and makes sure every
    /// animal-category item carries a sanitized creature payload.
    pub fn bootstrap(&mut self) {
        for category in &mut self.categories {
            if category.label.is_empty() {
                category.label = if category.name.is_empty() {
                    category.id.clone()
                } else {
                    category.name.clone()
                };
            }
        }
        for (id, name) in REQUIRED_CATEGORIES {
            if !self.categories.iter().any(|c| c.id == id) {
                self.categories.push(Category {
                    id: id.to_string(),
                    name: name.to_string(),
                    label: name.to_string(),
                });
            }
        }
        for item in &mut self.items {
            if item.category_id == ANIMAL_CATEGORY {
                item.creature = Some(
                    item.creature
                        .take()
                        .map_or_else(CreaturePayload::default, CreaturePayload::sanitized),
                );
            }
        }
    }
}

impl DocumentModel for ItemsDocument {
    const LIST_KEYS: &'static [&'static str] = &["categories", "items"];

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn creature_from_value_defaults_and_clamps() {
        let payload = CreaturePayload::from_value(&json!({
            "disposition": "Rabid",
            "animations": [
                {"animalId": "fox_1", "clipName": "run", "triggerChance": 3.0, "isIdle": "yes"},
                {"animalId": "", "clipName": ""},
            ],
            "skills": [
                {"name": "Pounce", "description": ""},
                {"name": "", "description": ""},
            ],
        }));

        assert_eq!(payload.disposition, Disposition::Neutral);
        assert_eq!(payload.animations.len(), 1);
        assert!((payload.animations[0].trigger_chance - 1.0).abs() < f64::EPSILON);
        assert!(payload.animations[0].is_idle);
        assert_eq!(payload.skills.len(), 1);
    }

    #[test]
    fn creature_from_non_object_is_default() {
        assert_eq!(
            CreaturePayload::from_value(&json!("nope")),
            CreaturePayload::default()
        );
    }

    #[test]
    fn bool_like_accepts_common_spellings() {
        assert!(bool_like(&json!(true)));
        assert!(bool_like(&json!(1)));
        assert!(bool_like(&json!("On")));
        assert!(!bool_like(&json!("off")));
        assert!(!bool_like(&json!("")));
        assert!(!bool_like(&json!(0)));
        assert!(!bool_like(&json!(null)));
        assert!(!bool_like(&json!("whatever")));
    }

    #[test]
    fn bootstrap_seeds_required_categories_once() {
        let mut doc = ItemsDocument::default();
        doc.bootstrap();
        let first = doc.categories.len();
        assert!(doc.categories.iter().any(|c| c.id == "animal"));
        assert!(doc.categories.iter().any(|c| c.id == "mineral"));

        doc.bootstrap();
        assert_eq!(doc.categories.len(), first);
    }

    #[test]
    fn bootstrap_backfills_labels_and_creature_payloads() {
        let mut doc = ItemsDocument {
            categories: vec![Category {
                id: "weapon".to_string(),
                name: "Weapon".to_string(),
                label: String::new(),
            }],
            items: vec![ItemRecord {
                id: "animal-fox_1".to_string(),
                category_id: ANIMAL_CATEGORY.to_string(),
                ..ItemRecord::default()
            }],
            metadata: Metadata::default(),
        };

        doc.bootstrap();
        assert_eq!(doc.categories[0].label, "Weapon");
        assert_eq!(doc.items[0].creature, Some(CreaturePayload::default()));
    }
}
