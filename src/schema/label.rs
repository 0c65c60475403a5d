//! Label derivation and identifier hygiene
//!
//! Labels and relationship types end up spliced into store statements
//! (constraint names, index predicates), so anything outside
//! `[A-Za-z_][A-Za-z0-9_]*` is rejected before it reaches the store.

/// True if `s` is safe to use as a label or relationship type.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Keep ASCII alphanumerics and `_`; separators become `_`; a leading
/// digit gets a `_` prefix. Returns an empty string if nothing survives.
pub fn sanitize_identifier(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else if c.is_whitespace() || c == '-' || c == '.' {
            out.push('_');
        }
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// First character upper-case, the rest lower-case.
fn capitalize(s: &str) -> String {
    let mut chars = s.trim().chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Derive the node label for a field name: capitalize, then sanitize.
///
/// Pure and deterministic. `None` when the name has no usable characters.
pub fn derive_label(field_name: &str) -> Option<String> {
    let label = sanitize_identifier(&capitalize(field_name));
    if label.is_empty() || label.chars().all(|c| c == '_') {
        None
    } else {
        Some(label)
    }
}

/// Normalize a chain relation sub-type: `"leads to"` → `"LEADS_TO"`.
pub fn normalize_relation_type(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}
