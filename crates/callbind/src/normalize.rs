//! Column/field name normalization used by auto-binding

/// Canonical comparison key for a column or field name.
///
/// Lower-cases the name and drops underscores, so `FIRST_NAME`, `first_name`
/// and `FirstName` all map to `firstname`.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}
