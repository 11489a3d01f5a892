/// Normalize a raw token into a search key.
///
/// Lower-cases and keeps alphanumeric characters only. Everything else is
/// dropped outright, so `"it's"` becomes `"its"` and `"--"` becomes `""`.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Split caption text on whitespace and yield the non-empty normalized words
pub fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(normalize)
        .filter(|word| !word.is_empty())
}
