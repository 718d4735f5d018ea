use serde::{Deserialize, Serialize};

/// Reference to an uploaded image file. The `path` is relative to the data
/// root so documents stay relocatable; the record owning the reference owns
/// the backing file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageRef {
    pub filename: String,
    pub path: String,
    pub label: String,
    pub uploaded_at: String,
}
