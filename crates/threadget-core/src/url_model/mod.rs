//! Filename model: sanitization and collision resolution.
//!
//! Target names must be unique within a run. Collisions are resolved before
//! scheduling, in input order: the first descriptor keeps its name, later ones
//! get `-<url stem>` (the source URL's last path segment without extension)
//! appended to their stem, or `-2`, `-3`, … when that is also taken.
//!
//! A name also counts as taken when it equals another file's temp name
//! (`<name>.part`) or when its own temp name equals another file's name, so
//! no in-flight temp file can be replaced by a sibling's rename.

mod path;
mod sanitize;

pub use path::filename_from_url_path;
pub use sanitize::{sanitize_filename, MAX_NAME_BYTES};

use sanitize::floor_at_char;

use std::collections::HashSet;

use crate::descriptor::Descriptor;
use crate::storage::TEMP_SUFFIX;

/// Splits `name` into stem and extension (with its dot). A leading dot does
/// not start an extension (`.bashrc` has none).
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name, ""),
    }
}

/// Comparison key: names differing only in case collide on case-insensitive
/// filesystems, so treat them as the same name.
fn name_key(name: &str) -> String {
    name.to_lowercase()
}

fn url_tag(source_url: &str) -> Option<String> {
    let segment = filename_from_url_path(source_url)?;
    let (stem, _) = split_extension(&segment);
    let tag = sanitize_filename(stem);
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

/// `<stem>-<suffix><ext>`, shortening the stem so the result stays within
/// `MAX_NAME_BYTES` and the suffix always survives.
fn with_suffix(stem: &str, suffix: &str, ext: &str) -> String {
    let budget = MAX_NAME_BYTES.saturating_sub(suffix.len() + 1 + ext.len());
    format!("{}-{}{}", floor_at_char(stem, budget), suffix, ext)
}

fn temp_key(name: &str) -> String {
    name_key(&format!("{}{}", name, TEMP_SUFFIX))
}

/// Records `name` and its temp name as taken.
pub fn reserve_name(name: &str, taken: &mut HashSet<String>) {
    taken.insert(name_key(name));
    taken.insert(temp_key(name));
}

fn is_free(candidate: &str, taken: &HashSet<String>) -> bool {
    !taken.contains(&name_key(candidate)) && !taken.contains(&temp_key(candidate))
}

/// Returns the first name derived from `name` that does not clash with
/// anything in `taken` (as filled by [`reserve_name`]).
pub fn unique_name_among(name: &str, source_url: &str, taken: &HashSet<String>) -> String {
    if is_free(name, taken) {
        return name.to_string();
    }
    let (stem, ext) = split_extension(name);
    if let Some(tag) = url_tag(source_url).filter(|t| t != stem) {
        let candidate = with_suffix(stem, &tag, ext);
        if is_free(&candidate, taken) {
            return candidate;
        }
    }
    let mut n = 2u64;
    loop {
        let candidate = with_suffix(stem, &n.to_string(), ext);
        if is_free(&candidate, taken) {
            return candidate;
        }
        n += 1;
    }
}

/// Gives every descriptor a distinct target name. Deterministic: the same
/// input list always yields the same names.
pub fn assign_unique_names(descriptors: Vec<Descriptor>) -> Vec<Descriptor> {
    let mut taken: HashSet<String> = HashSet::with_capacity(descriptors.len() * 2);
    descriptors
        .into_iter()
        .map(|d| {
            let name = unique_name_among(d.target_name(), d.source_url(), &taken);
            reserve_name(&name, &mut taken);
            if name == d.target_name() {
                d
            } else {
                tracing::debug!(
                    from = d.target_name(),
                    to = %name,
                    url = d.source_url(),
                    "resolved target name collision"
                );
                d.renamed(name)
            }
        })
        .collect()
}
