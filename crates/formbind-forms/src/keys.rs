//! Flat key protocol for nested and repeated fields.
//!
//! Submitted form data is a single-level namespace. Nested objects are
//! addressed with dotted keys (`owner.name`) and list items with integer
//! segments (`tags.0`, `tags.1`, `addresses.2.city`).

use std::collections::BTreeSet;
use std::fmt::Display;

/// Separator between key segments.
pub const SEPARATOR: char = '.';

/// Joins `segment` onto `prefix`.
///
/// Returns `segment` alone when `prefix` is empty.
///
/// # Examples
///
/// ```
/// use formbind_forms::keys::compose;
///
/// assert_eq!(compose("", "name"), "name");
/// assert_eq!(compose("owner", "name"), "owner.name");
/// assert_eq!(compose("tags", 3), "tags.3");
/// ```
pub fn compose(prefix: &str, segment: impl Display) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}{SEPARATOR}{segment}")
    }
}

/// Returns the sorted, de-duplicated item indices present under
/// `list_prefix`.
///
/// Only keys of the form `<list_prefix>.<digits>[.rest]` count. Keys that
/// belong to other fields, or whose next segment is not purely numeric,
/// are ignored. Gaps are preserved.
///
/// # Examples
///
/// ```
/// use formbind_forms::keys::extract_indices;
///
/// let keys = ["xys.3", "xys.0", "xys.1", "xys.1.name", "xys.x", "other"];
/// assert_eq!(extract_indices(keys, "xys"), vec![0, 1, 3]);
/// ```
pub fn extract_indices<'a, I>(keys: I, list_prefix: &str) -> Vec<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let indices: BTreeSet<usize> = keys
        .into_iter()
        .filter_map(|key| index_segment(key, list_prefix))
        .collect();
    indices.into_iter().collect()
}

fn index_segment(key: &str, list_prefix: &str) -> Option<usize> {
    let rest = key.strip_prefix(list_prefix)?.strip_prefix(SEPARATOR)?;
    let segment = rest.split(SEPARATOR).next()?;
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
