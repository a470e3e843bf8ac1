//! Version ordering
//!
//! Versions are opaque strings compared lexicographically, never numerically.
//! Numeric versions must be zero-padded to sort as numbers.

use std::cmp::Ordering;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Compare two versions in the given direction
#[must_use]
pub fn compare_versions(direction: SortDirection, a: &str, b: &str) -> Ordering {
    match direction {
        SortDirection::Asc => a.cmp(b),
        SortDirection::Desc => b.cmp(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_versions_is_lexicographic() {
        assert_eq!(compare_versions(SortDirection::Asc, "10", "2"), Ordering::Less);
        assert_eq!(compare_versions(SortDirection::Asc, "002", "010"), Ordering::Less);

        let mut versions = vec!["10", "2", "01", "1"];
        versions.sort_by(|a, b| compare_versions(SortDirection::Desc, a, b));
        assert_eq!(versions, vec!["2", "10", "1", "01"]);
    }

    #[test]
    fn test_compare_versions_direction() {
        assert_eq!(compare_versions(SortDirection::Asc, "01", "02"), Ordering::Less);
        assert_eq!(compare_versions(SortDirection::Desc, "01", "02"), Ordering::Greater);
        assert_eq!(compare_versions(SortDirection::Desc, "03", "03"), Ordering::Equal);
    }
}
