//! Portable filename sanitization.

/// Longest file name we produce, in bytes. Leaves room for the `.part`
/// suffix under the common 255-byte NAME_MAX.
pub const MAX_NAME_BYTES: usize = 250;

/// Characters rejected by at least one of Linux, Windows or macOS.
fn is_blocked(c: char) -> bool {
    c.is_control() || matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
}

/// Sanitizes a candidate filename so it is valid on common filesystems.
///
/// - Replaces control characters and `<>:"/\|?*` with `_`
/// - Collapses consecutive replacements into one `_`
/// - Trims leading/trailing spaces and dots
/// - Limits length to `MAX_NAME_BYTES`, keeping a short extension intact
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_replaced = false;

    for c in name.chars() {
        if is_blocked(c) {
            if !prev_replaced {
                out.push('_');
            }
            prev_replaced = true;
        } else {
            out.push(c);
            prev_replaced = false;
        }
    }

    let trimmed = out.trim_matches(|c: char| c == ' ' || c == '.');
    truncate_keeping_extension(trimmed, MAX_NAME_BYTES)
}

fn truncate_keeping_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let (stem, ext) = super::split_extension(name);
    if ext.len() >= max / 2 {
        return floor_at_char(name, max).to_string();
    }
    let stem = floor_at_char(stem, max - ext.len());
    format!("{}{}", stem.trim_end_matches([' ', '.']), ext)
}

pub(super) fn floor_at_char(s: &str, max: usize) -> &str {
    let mut take = max.min(s.len());
    while take > 0 && !s.is_char_boundary(take) {
        take -= 1;
    }
    &s[..take]
}
