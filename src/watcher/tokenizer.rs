//! Filename tokenization for filename parts and FILENAME tags.

use std::path::Path;

/// Lower-cased word tokens of a filename.
///
/// Files lose their final extension; directories keep their whole name.
/// Anything that is not alphanumeric or `_` separates tokens.
#[must_use]
pub fn filename_tokens(path: &Path, is_directory: bool) -> Vec<String> {
    let name = if is_directory {
        path.file_name()
    } else {
        path.file_stem()
    };

    let Some(name) = name else {
        return Vec::new();
    };

    name.to_string_lossy()
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Distinct tokens in first-seen order.
#[must_use]
pub fn distinct_tokens(tokens: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokens
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}
