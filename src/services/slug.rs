//! Slug generation
//!
//! Turns a post title into the identifier used in its URL.

/// Derive a URL slug from a title.
///
/// Letters and digits are kept and lowercased, including non-ASCII ones
/// (Cyrillic, CJK and so on). Everything else separates words, and runs of
/// separators collapse into a single `-` with none at either end.
///
/// ```ignore
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("Привет Мир"), "привет-мир");
/// ```
pub fn slugify(title: &str) -> String {
    let mut result = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if !c.is_alphanumeric() {
            pending_hyphen = true;
            continue;
        }

        let lowered: String = c.to_lowercase().filter(|l| l.is_alphanumeric()).collect();
        if lowered.is_empty() {
            continue;
        }
        if pending_hyphen && !result.is_empty() {
            result.push('-');
        }
        pending_hyphen = false;
        result.push_str(&lowered);
    }

    result
}
