use crate::shared::SinkKind;

/// Outcome of classifying one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Palindrome,
    NotPalindrome,
}

impl Verdict {
    /// Sink that receives items with this verdict
    pub fn sink(self) -> SinkKind {
        match self {
            Verdict::Palindrome => SinkKind::Palindrome,
            Verdict::NotPalindrome => SinkKind::NonPalindrome,
        }
    }
}

/// Pluggable classification function run by every worker
pub trait Classifier: Send + Sync {
    fn classify(&self, item: &str) -> Verdict;
}

/// Reads the same forwards and backwards, compared by `char`
#[derive(Debug, Clone, Copy, Default)]
pub struct Palindrome;

impl Classifier for Palindrome {
    fn classify(&self, item: &str) -> Verdict {
        if item.chars().eq(item.chars().rev()) {
            Verdict::Palindrome
        } else {
            Verdict::NotPalindrome
        }
    }
}

impl<F> Classifier for F
where
    F: Fn(&str) -> Verdict + Send + Sync,
{
    fn classify(&self, item: &str) -> Verdict {
        self(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palindromes() {
        for word in ["civic", "racecar", "a", "", "noon", "été"] {
            assert_eq!(Palindrome.classify(word), Verdict::Palindrome, "{word}");
        }
    }

    #[test]
    fn test_non_palindromes() {
        for word in ["hello", "ab", "Civic", "étés"] {
            assert_eq!(Palindrome.classify(word), Verdict::NotPalindrome, "{word}");
        }
    }

    #[test]
    fn test_closure_classifier() {
        let everything = |_: &str| Verdict::NotPalindrome;
        assert_eq!(everything.classify("civic"), Verdict::NotPalindrome);
    }

    #[test]
    fn test_verdict_sink() {
        assert_eq!(Verdict::Palindrome.sink(), SinkKind::Palindrome);
        assert_eq!(Verdict::NotPalindrome.sink(), SinkKind::NonPalindrome);
    }
}
