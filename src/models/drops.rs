use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropSource {
    Entity,
    Material,
    Weapon,
    Armor,
    Decor,
    Interactive,
    Building,
    Resource,
    Consumable,
    Crop,
    Mineral,
    Tree,
    Animal,
}

impl DropSource {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "entity" => Some(Self::Entity),
            "material" => Some(Self::Material),
            "weapon" => Some(Self::Weapon),
            "armor" => Some(Self::Armor),
            "decor" => Some(Self::Decor),
            "interactive" => Some(Self::Interactive),
            "building" => Some(Self::Building),
            "resource" => Some(Self::Resource),
            "consumable" => Some(Self::Consumable),
            "crop" => Some(Self::Crop),
            "mineral" => Some(Self::Mineral),
            "tree" => Some(Self::Tree),
            "animal" => Some(Self::Animal),
            _ => None,
        }
    }
}

/// One loot roll. Pure value, not owned by any entity; stored values are
/// always clamped (`chance` in [0,1], `0 <= min <= max`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DropRule {
    pub chance: f64,
    pub min: i64,
    pub max: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<DropSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl Default for DropRule {
    fn default() -> Self {
        Self {
            chance: 0.0,
            min: 1,
            max: 1,
            item_id: None,
            source_type: None,
            source_id: None,
        }
    }
}

impl DropRule {
    /// Builds a clamped rule from one loosely-typed JSON entry. Returns
    /// `None` when the entry is not an object.
    #[must_use]
    pub fn from_value(entry: &Value) -> Option<Self> {
        let obj = entry.as_object()?;

        let chance = obj
            .get("chance")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let min = obj.get("min").and_then(Value::as_i64).unwrap_or(1).max(0);
        let max = obj.get("max").and_then(Value::as_i64).unwrap_or(min).max(min);

        let item_id = obj
            .get("itemId")
            .and_then(Value::as_str)
            .map(sanitize_ref);

        // A source pair is only kept when the type is in the allowed set.
        let (source_type, source_id) = match (
            obj.get("sourceType").and_then(Value::as_str),
            obj.get("sourceId").and_then(Value::as_str),
        ) {
            (Some(raw_type), Some(raw_id)) => {
                match DropSource::parse(&raw_type.trim().to_lowercase()) {
                    Some(source) => (Some(source), Some(sanitize_ref(raw_id))),
                    None => (None, None),
                }
            }
            _ => (None, None),
        };

        Some(Self {
            chance,
            min,
            max,
            item_id,
            source_type,
            source_id,
        })
    }
}

/// Parses a raw `drops` field (already-decoded array or JSON text) into
/// clamped rules, skipping anything that is not an object.
#[must_use]
pub fn parse_drop_rules(raw: &str) -> Vec<DropRule> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(trimmed) else {
        return Vec::new();
    };
    entries.iter().filter_map(DropRule::from_value).collect()
}

/// Strips a referenced id down to `[A-Za-z0-9_-]`.
#[must_use]
pub fn sanitize_ref(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}
