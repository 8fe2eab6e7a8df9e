//! Discovery keywords
//!
//! Automatically created shares are tagged with single-character keywords
//! sampled from the batch text, padded with random alphanumerics so a
//! non-empty text always yields exactly [`KEYWORD_COUNT`] of them.

use rand::seq::SliceRandom;

/// Number of keywords derived from non-empty text
pub const KEYWORD_COUNT: usize = 4;

/// Maximum length of an operator-supplied keyword, in characters
pub const MAX_KEYWORD_CHARS: usize = 32;

const FILLER_POOL: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Derive discovery keywords from batch text
///
/// Whitespace, punctuation and underscores are ignored. Empty (or
/// whitespace-only) text yields no keywords.
pub fn derive_keywords(group_text: &str) -> Vec<String> {
    let mut distinct: Vec<char> = Vec::new();
    for c in group_text.chars().filter(|c| c.is_alphanumeric()) {
        if !distinct.contains(&c) {
            distinct.push(c);
        }
    }

    if distinct.is_empty() && group_text.trim().is_empty() {
        return Vec::new();
    }

    let mut rng = rand::thread_rng();

    if distinct.len() >= KEYWORD_COUNT {
        return distinct
            .choose_multiple(&mut rng, KEYWORD_COUNT)
            .map(|c| c.to_string())
            .collect();
    }

    let mut pool: Vec<char> = FILLER_POOL.iter().map(|&b| char::from(b)).collect();
    pool.shuffle(&mut rng);
    for c in pool {
        if distinct.len() >= KEYWORD_COUNT {
            break;
        }
        if !distinct.contains(&c) {
            distinct.push(c);
        }
    }

    distinct.into_iter().map(|c| c.to_string()).collect()
}

/// Clean an operator-supplied keyword list
///
/// Trims entries, drops empty ones and duplicates (first occurrence wins)
/// and truncates each to [`MAX_KEYWORD_CHARS`] characters.
pub fn normalize_keywords<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut keywords: Vec<String> = Vec::new();
    for entry in raw {
        let trimmed = entry.as_ref().trim();
        if trimmed.is_empty() || keywords.iter().any(|k| k == trimmed) {
            continue;
        }
        keywords.push(trimmed.chars().take(MAX_KEYWORD_CHARS).collect());
    }
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(derive_keywords("").is_empty());
        assert!(derive_keywords("   \n\t").is_empty());
    }

    #[test]
    fn test_short_text_is_padded() {
        let keywords = derive_keywords("cat");
        assert_eq!(keywords.len(), KEYWORD_COUNT);
        assert_eq!(&keywords[..3], &["c", "a", "t"]);
        assert!(!["c", "a", "t"].contains(&keywords[3].as_str()));
        assert!(keywords[3].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_long_text_samples_distinct_chars() {
        let text = "hello world, again";
        for _ in 0..20 {
            let keywords = derive_keywords(text);
            assert_eq!(keywords.len(), KEYWORD_COUNT);
            for k in &keywords {
                assert_eq!(k.chars().count(), 1);
                assert!(text.contains(k.as_str()));
            }
            let mut unique = keywords.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), KEYWORD_COUNT);
        }
    }

    #[test]
    fn test_punctuation_only_is_all_filler() {
        let keywords = derive_keywords("!!! ___ ???");
        assert_eq!(keywords.len(), KEYWORD_COUNT);
        assert!(keywords.iter().all(|k| k.chars().all(|c| c.is_ascii_alphanumeric())));
    }

    #[test]
    fn test_non_ascii_letters_count() {
        let keywords = derive_keywords("猫猫狗");
        assert_eq!(&keywords[..2], &["猫", "狗"]);
        assert_eq!(keywords.len(), KEYWORD_COUNT);
    }

    #[test]
    fn test_normalize_keywords() {
        let long = "x".repeat(40);
        let keywords = normalize_keywords(["  cat ", "", "dog", "cat", long.as_str()]);
        assert_eq!(keywords.len(), 3);
        assert_eq!(keywords[0], "cat");
        assert_eq!(keywords[1], "dog");
        assert_eq!(keywords[2].len(), MAX_KEYWORD_CHARS);
    }
}
