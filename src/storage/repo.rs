use regex::Regex;
use std::sync::OnceLock;

use super::short_token;

/// Anything stored in a document's entity list, keyed by its string id.
pub trait Entity {
    fn id(&self) -> &str;
}

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

/// First entry whose id matches exactly (case-sensitive).
#[must_use]
pub fn find_index<E: Entity>(entries: &[E], id: &str) -> Option<usize> {
    entries.iter().position(|entry| entry.id() == id)
}

/// Replaces the entry with the same id, or appends when there is none.
pub fn upsert_by_id<E: Entity>(entries: &mut Vec<E>, entry: E) {
    match find_index(entries, entry.id()) {
        Some(index) => entries[index] = entry,
        None => entries.push(entry),
    }
}

/// Normalizes a display name into a filename-safe slug: lowercased,
/// stripped to letters/digits/marks/hyphen/underscore, whitespace collapsed
/// to hyphens. Falls back to the given token when nothing survives.
#[must_use]
pub fn slugify(value: &str, fallback: &str) -> String {
    static STRIP: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let lowered = value.trim().to_lowercase();
    let stripped = get_regex(&STRIP, r"[^\p{L}\p{N}\p{M}_\-\s]").replace_all(&lowered, "");
    let slug = get_regex(&SPACES, r"\s+")
        .replace_all(stripped.trim(), "-")
        .into_owned();
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

/// Slug plus a short random suffix, so repeated names stay distinct.
#[must_use]
pub fn generate_id(name: &str, fallback: &str) -> String {
    format!("{}_{}", slugify(name, fallback), short_token())
}

/// Like [`generate_id`], retrying on the improbable suffix collision so the
/// result is guaranteed unused in `entries`.
#[must_use]
pub fn unique_id<E: Entity>(entries: &[E], name: &str, fallback: &str) -> String {
    loop {
        let id = generate_id(name, fallback);
        if find_index(entries, &id).is_none() {
            return id;
        }
    }
}
