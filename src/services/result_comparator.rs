//! Output comparison for attempts.
//!
//! Both sides are trimmed of leading and trailing whitespace and compared
//! case-insensitively. A case-sensitive mode exists for callers that need
//! the stricter behavior.

/// Pass/fail judge for captured output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultComparator {
    case_sensitive: bool,
}

impl ResultComparator {
    pub const fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }

    pub const fn case_insensitive() -> Self {
        Self::new(false)
    }

    /// Exact match after normalization; no partial credit.
    pub fn matches(&self, actual: &str, expected: &str) -> bool {
        let actual = actual.trim();
        let expected = expected.trim();

        if self.case_sensitive {
            actual == expected
        } else {
            actual == expected || actual.to_lowercase() == expected.to_lowercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_ignores_case() {
        let comparator = ResultComparator::case_insensitive();
        assert!(comparator.matches(" OK \n", "ok"));
        assert!(comparator.matches("olleh", "olleh"));
        assert!(comparator.matches("\tTrue\r\n", "true"));
    }

    #[test]
    fn test_case_sensitive_mode() {
        let comparator = ResultComparator::new(true);
        assert!(!comparator.matches(" OK \n", "ok"));
        assert!(comparator.matches(" ok \n", "ok"));
    }

    #[test]
    fn test_no_partial_credit() {
        let comparator = ResultComparator::default();
        assert!(!comparator.matches("olle", "olleh"));
        assert!(!comparator.matches("[1, 2, 3]", "[1,2,3]"));
        assert!(!comparator.matches("", "olleh"));
    }

    #[test]
    fn test_interior_whitespace_is_significant() {
        let comparator = ResultComparator::default();
        assert!(!comparator.matches("1 2", "1  2"));
        assert!(!comparator.matches("a\nb", "a b"));
    }

    #[test]
    fn test_unicode_case_folding() {
        let comparator = ResultComparator::default();
        assert!(comparator.matches("ÉTÉ", "été"));
    }

    #[test]
    fn test_repeated_calls_agree() {
        let comparator = ResultComparator::default();
        let first = comparator.matches("Hello", "hello ");
        for _ in 0..5 {
            assert_eq!(comparator.matches("Hello", "hello "), first);
        }
    }
}
