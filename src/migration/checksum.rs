//! Content hashing for migration bodies

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n]+").expect("valid line break pattern"));

/// Normalize migration content before hashing
///
/// Every line is trimmed and blank lines are dropped, so line-ending style,
/// indentation and blank lines never affect the hash. Sanitizing is
/// idempotent.
#[must_use]
pub fn sanitize_content(content: &str) -> String {
    LINE_BREAKS
        .split(content)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Calculate the hex encoded SHA-256 hash of normalized migration content
///
/// This is compared against the hash stored with each applied record to
/// detect migration sources edited after deployment.
#[must_use]
pub fn get_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sanitize_content(content).as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_collapses_line_breaks() {
        assert_eq!(sanitize_content("a\r\n\r\nb\rc\n\n\nd"), "a\nb\nc\nd");
    }

    #[test]
    fn test_sanitize_trims_text_and_lines() {
        assert_eq!(
            sanitize_content("  \n  SELECT 1;  \n\t  SELECT 2;\t\n  "),
            "SELECT 1;\nSELECT 2;"
        );
    }

    #[test]
    fn test_hash_ignores_line_ending_style() {
        assert_eq!(get_hash("SELECT 1;\r\n"), get_hash("SELECT 1;\n"));
        assert_eq!(
            get_hash("CREATE TABLE t (\r\n  id INT\r\n);\r\n"),
            get_hash("CREATE TABLE t (\nid INT\n);")
        );
    }

    #[test]
    fn test_hash_ignores_surrounding_whitespace() {
        assert_eq!(get_hash("   SELECT 1;   "), get_hash("SELECT 1;"));
        assert_eq!(get_hash("SELECT 1;\n\n\nSELECT 2;"), get_hash("SELECT 1;\nSELECT 2;"));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for raw in [
            "SELECT 1;\n   \nSELECT 2;",
            "  a \r\n\t\r\n  b\r\r c  ",
            "\n\n  \n",
            "CREATE TABLE t (\r\n  id INT\r\n);",
        ] {
            let once = sanitize_content(raw);
            assert_eq!(sanitize_content(&once), once, "input: {raw:?}");
        }
    }

    #[test]
    fn test_hash_ignores_whitespace_only_lines() {
        // an editor stripping trailing blanks must not change the hash
        assert_eq!(get_hash("SELECT 1;\n   \nSELECT 2;"), get_hash("SELECT 1;\n\nSELECT 2;"));
        assert_eq!(get_hash("SELECT 1;\n   \nSELECT 2;"), get_hash("SELECT 1;\nSELECT 2;"));
    }

    #[test]
    fn test_hash_detects_content_change() {
        assert_ne!(get_hash("SELECT 1;"), get_hash("SELECT 2;"));
        // interior whitespace within a line is significant
        assert_ne!(get_hash("SELECT  1;"), get_hash("SELECT 1;"));
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        // sha256("") is well known
        assert_eq!(
            get_hash("   \r\n  "),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(get_hash("SELECT 1;").len(), 64);
    }
}
