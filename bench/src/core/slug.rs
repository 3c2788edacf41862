//! Filesystem-safe identifiers and output directory naming.

/// Lowercase `input`, collapse runs of non-alphanumeric characters into a single
/// hyphen, and drop leading/trailing hyphens.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Output directory name for a (provider, model, game) triple.
///
/// Slugs never contain `--`, so the double-hyphen separator keeps the name
/// unambiguous.
pub fn output_dir_name(provider_id: &str, model_key: &str, game_key: &str) -> String {
    format!(
        "{}--{}--{}",
        slugify(provider_id),
        slugify(model_key),
        slugify(game_key)
    )
}
