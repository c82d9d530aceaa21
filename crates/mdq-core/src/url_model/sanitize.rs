//! Title sanitation for use as a display name and output file name.

/// Maximum length in bytes (Linux NAME_MAX).
const NAME_MAX: usize = 255;

/// Strips characters that are illegal in file names on common filesystems.
///
/// - Removes `< > : " / \ | ? *`
/// - Replaces control characters with a space
/// - Trims surrounding whitespace and dots
/// - Limits length to 255 bytes
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => {}
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }

    let trimmed = out.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}
