// src/bot/word_matching.rs - Whole-word, case-insensitive prohibited word matching

/// Characters dropped from a message before it is split into words
pub const STRIPPED_PUNCTUATION: &str = ".,:;\"'!@#$%^&*()_+=/\\<>[]{}~";

/// Find every occurrence of a known word in `text`.
///
/// Words are compared whole and case-insensitively against the whitespace-separated tokens
/// of the text once punctuation is stripped. Each occurrence yields one entry carrying the
/// casing from `known_words`, grouped by known word in `known_words` order.
pub fn find_words<S: AsRef<str>>(text: &str, known_words: &[S]) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(*c))
        .collect();

    let tokens: Vec<String> = cleaned.split_whitespace().map(str::to_lowercase).collect();

    let mut found = Vec::new();
    for known in known_words {
        let known = known.as_ref();
        let folded = known.to_lowercase();
        for token in &tokens {
            if *token == folded {
                found.push(known.to_string());
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Tested tests test testing";

    #[test]
    fn test_only_whole_words_match() {
        assert!(find_words(TEXT, &["asd"]).is_empty());
        assert_eq!(find_words(TEXT, &["test"]), vec!["test"]);
        assert_eq!(find_words(TEXT, &["test", "testing"]).len(), 2);
    }

    #[test]
    fn test_matching_ignores_case() {
        assert_eq!(find_words("TEST", &["test"]), vec!["test"]);
        assert_eq!(find_words(&TEXT.to_uppercase(), &["Test"]), vec!["Test"]);
        assert_eq!(find_words(&TEXT.to_uppercase(), &["Test", "Testing"]).len(), 2);
    }

    #[test]
    fn test_every_occurrence_counts() {
        assert_eq!(find_words("test test", &["test"]), vec!["test", "test"]);
        assert_eq!(
            find_words("this is spam spam", &["spam"]),
            vec!["spam".to_string(), "spam".to_string()]
        );
    }

    #[test]
    fn test_punctuation_is_stripped() {
        assert_eq!(find_words("(spam)! \"spam\", spam.", &["spam"]).len(), 3);
        assert_eq!(find_words("s_p_a_m", &["spam"]), vec!["spam"]);
        assert!(find_words("spam-ish", &["spam"]).is_empty());
    }

    #[test]
    fn test_results_grouped_by_known_word() {
        let found = find_words("b a b", &["a", "b"]);
        assert_eq!(found, vec!["a", "b", "b"]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(find_words("", &["spam"]).is_empty());
        assert!(find_words("spam", &[] as &[&str]).is_empty());
        assert!(find_words("   \t\n", &["spam"]).is_empty());
    }
}
