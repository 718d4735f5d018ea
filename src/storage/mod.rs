pub mod document;
pub mod repo;

pub use document::{DocumentStore, StorageError, ensure_dir};

/// Short random token used for id suffixes, temporary file names, and
/// collision-resistant flat asset names.
#[must_use]
pub(crate) fn short_token() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(6);
    token
}
