//! Boundary normalization: multipart requests are decoded here into the
//! typed field structs the services consume, so the core never sees the
//! loosely-typed wire values (JSON-or-comma-separated lists, bool-like
//! strings, creature payloads sent as JSON text).

use axum::extract::Multipart;
use axum::extract::multipart::Field;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use super::ApiError;
use crate::assets::IncomingUpload;
use crate::models::drops::parse_drop_rules;
use crate::models::item::bool_like;
use crate::models::CreaturePayload;
use crate::services::{AnimalFields, FieldUpdate, ItemFields};

#[derive(Debug, Default)]
struct FormData {
    text: HashMap<String, Vec<String>>,
    uploads: HashMap<String, IncomingUpload>,
}

impl FormData {
    /// First value of a text field; `Some` means the field was sent.
    fn single(&self, key: &str) -> Option<String> {
        self.text.get(key).and_then(|values| values.first().cloned())
    }

    /// List field: a single value is parsed as JSON-array-or-comma-list,
    /// repeated values (`key[]`) are taken as-is.
    fn list(&self, key: &str) -> Option<Vec<String>> {
        let values = self.text.get(key)?;
        if let [single] = values.as_slice() {
            return Some(parse_list_text(single));
        }
        Some(
            values
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
        )
    }
}

async fn collect(multipart: &mut Multipart, file_fields: &[&str]) -> Result<FormData, ApiError> {
    let mut data = FormData::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name() else { continue };
        let key = name.trim_end_matches("[]").to_string();

        if file_fields.contains(&key.as_str()) && field.file_name().is_some() {
            let filename = field.file_name().unwrap_or_default().to_string();
            // Browsers submit an empty part when no file was chosen.
            if filename.is_empty() {
                continue;
            }
            let upload = spool_upload(field, filename).await;
            data.uploads.insert(key, upload);
        } else {
            let value = field.text().await?;
            data.text.entry(key).or_default().push(value);
        }
    }
    Ok(data)
}

/// Writes the received bytes to a temp file, producing the normalized
/// upload handle the asset manager validates. Receive-side failures are
/// recorded on the handle rather than aborting the whole request, matching
/// the upload-error contract.
async fn spool_upload(field: Field<'_>, filename: String) -> IncomingUpload {
    match field.bytes().await {
        Ok(bytes) => {
            let temp_path = std::env::temp_dir().join(format!(
                "faunarr_upload_{}",
                uuid::Uuid::new_v4().simple()
            ));
            let size = bytes.len() as u64;
            match tokio::fs::write(&temp_path, &bytes).await {
                Ok(()) => IncomingUpload {
                    filename,
                    temp_path,
                    size,
                    error: None,
                },
                Err(error) => IncomingUpload {
                    filename,
                    temp_path,
                    size,
                    error: Some(format!("failed to spool upload: {error}")),
                },
            }
        }
        Err(error) => IncomingUpload {
            filename,
            temp_path: PathBuf::new(),
            size: 0,
            error: Some(error.to_string()),
        },
    }
}

pub async fn read_animal_form(multipart: &mut Multipart) -> Result<AnimalFields, ApiError> {
    let data = collect(multipart, &["image"]).await?;
    Ok(AnimalFields {
        name: data.single("name"),
        notes: data.single("notes"),
        drop_set_ids: data.list("dropSetIds"),
        drops: data.single("drops").map(|raw| parse_drop_rules(&raw)),
        image_label: data
            .single("imageLabel")
            .unwrap_or_default()
            .trim()
            .to_string(),
        image: data.uploads.get("image").cloned(),
    })
}

pub async fn read_item_form(multipart: &mut Multipart) -> Result<ItemFields, ApiError> {
    let data = collect(multipart, &["image", "screenImage"]).await?;
    Ok(ItemFields {
        name: data.single("name"),
        category_id: data.single("categoryId"),
        notes: data.single("notes"),
        terrains: data.list("terrains"),
        drop_set_ids: data.list("dropSetIds"),
        drops: data.single("drops").map(|raw| parse_drop_rules(&raw)),
        creature: data
            .single("creature")
            .map_or(FieldUpdate::Absent, |raw| parse_creature_field(&raw)),
        ai: data
            .single("ai")
            .map_or(FieldUpdate::Absent, |raw| parse_opaque_field(&raw)),
        remove_image: data
            .single("removeImage")
            .is_some_and(|raw| bool_like(&Value::String(raw))),
        image: data.uploads.get("image").cloned(),
        image_label: data.single("imageLabel"),
        screen: data.uploads.get("screenImage").cloned(),
        screen_name: data.single("screenName").unwrap_or_default(),
    })
}

/// Single-value list fields arrive either as a JSON array or as a
/// comma-separated string; entries are trimmed and empties dropped.
fn parse_list_text(raw: &str) -> Vec<String> {
    if let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(raw) {
        return entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect();
    }
    raw.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_creature_field(raw: &str) -> FieldUpdate<CreaturePayload> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return FieldUpdate::Clear;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) if value.is_object() => FieldUpdate::Set(CreaturePayload::from_value(&value)),
        _ => FieldUpdate::Clear,
    }
}

fn parse_opaque_field(raw: &str) -> FieldUpdate<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return FieldUpdate::Clear;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) if !value.is_null() => FieldUpdate::Set(value),
        _ => FieldUpdate::Clear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_text_accepts_json_arrays() {
        assert_eq!(
            parse_list_text(r#"[" forest ", "plains", ""]"#),
            vec!["forest", "plains"]
        );
        assert_eq!(parse_list_text("[1, 2]"), vec!["1", "2"]);
    }

    #[test]
    fn list_text_falls_back_to_comma_split() {
        assert_eq!(
            parse_list_text("forest, plains , ,swamp"),
            vec!["forest", "plains", "swamp"]
        );
        assert!(parse_list_text("").is_empty());
    }

    #[test]
    fn creature_field_distinguishes_clear_from_set() {
        assert!(matches!(parse_creature_field(""), FieldUpdate::Clear));
        assert!(matches!(parse_creature_field("null"), FieldUpdate::Clear));
        assert!(matches!(
            parse_creature_field("not json"),
            FieldUpdate::Clear
        ));
        assert!(matches!(
            parse_creature_field(r#"{"disposition": "hostile"}"#),
            FieldUpdate::Set(_)
        ));
    }

    #[test]
    fn opaque_field_keeps_any_valid_json() {
        assert!(matches!(
            parse_opaque_field(r#"{"behavior": "wander"}"#),
            FieldUpdate::Set(_)
        ));
        assert!(matches!(
            parse_opaque_field(r#"["a", "b"]"#),
            FieldUpdate::Set(_)
        ));
        assert!(matches!(parse_opaque_field("null"), FieldUpdate::Clear));
    }
}
