//! String utilities

/// Safely truncate a string at a character boundary
///
/// # Example
/// ```
/// use api_rotation::utils::truncate_str;
///
/// let text = "Hello, 世界!";
/// assert_eq!(truncate_str(text, 8), "Hello, 世");
/// assert_eq!(truncate_str(text, 100), "Hello, 世界!");
/// ```
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string and append a suffix if anything was cut
pub fn truncate_with_suffix(s: &str, max_chars: usize, suffix: &str) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}{}", truncate_str(s, max_chars), suffix)
    }
}

const PREVIEW_HEAD: usize = 10;
const PREVIEW_TAIL: usize = 4;

/// Redacted form of a secret for logs and status reports
///
/// Long secrets keep their first 10 and last 4 characters. Shorter ones keep
/// at most a quarter of their characters so no preview ever reveals a whole
/// key.
///
/// ```
/// use api_rotation::utils::key_preview;
///
/// assert_eq!(key_preview("sk-or-v1-abcdef0123456789"), "sk-or-v1-a...6789");
/// assert_eq!(key_preview("short"), "s...");
/// ```
pub fn key_preview(secret: &str) -> String {
    let len = secret.chars().count();
    if len > PREVIEW_HEAD + PREVIEW_TAIL {
        let tail: String = secret.chars().skip(len - PREVIEW_TAIL).collect();
        format!("{}...{}", truncate_str(secret, PREVIEW_HEAD), tail)
    } else if len == 0 {
        String::new()
    } else {
        format!("{}...", truncate_str(secret, len / 4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_ascii() {
        let text = "Hello, World!";
        assert_eq!(truncate_str(text, 5), "Hello");
        assert_eq!(truncate_str(text, 100), "Hello, World!");
    }

    #[test]
    fn test_truncate_str_unicode() {
        let text = "Hello, 世界!";
        assert_eq!(truncate_str(text, 7), "Hello, ");
        assert_eq!(truncate_str(text, 8), "Hello, 世");
        assert_eq!(truncate_str(text, 9), "Hello, 世界");
    }

    #[test]
    fn test_truncate_with_suffix() {
        assert_eq!(truncate_with_suffix("Hello, World!", 5, "..."), "Hello...");
        assert_eq!(truncate_with_suffix("Hi", 5, "..."), "Hi");
        assert_eq!(truncate_with_suffix("", 10, "..."), "");
    }

    #[test]
    fn test_key_preview_long_secret() {
        assert_eq!(key_preview("0123456789abcdefghij"), "0123456789...ghij");
        assert_eq!(key_preview("0123456789abcde"), "0123456789...bcde");
    }

    #[test]
    fn test_key_preview_never_reveals_short_secret() {
        for secret in ["a", "abcd", "abcdefgh", "0123456789abcd"] {
            let preview = key_preview(secret);
            assert!(!preview.contains(secret), "{} leaked in {}", secret, preview);
            assert!(preview.ends_with("..."));
        }
        assert_eq!(key_preview(""), "");
    }
}
