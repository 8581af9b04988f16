//! Text analysis for the local index.

use unicode_segmentation::UnicodeSegmentation;

/// Lowercasing, unicode-aware word tokenizer with a stopword list.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    /// Minimum token length in bytes (default: 2)
    pub min_token_length: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            min_token_length: 2,
        }
    }
}

impl Tokenizer {
    /// Tokenize a string into normalized keywords.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .unicode_words()
            .filter(|word| word.len() >= self.min_token_length)
            .filter(|word| !is_stopword(word))
            .map(String::from)
            .collect()
    }
}

fn is_stopword(word: &str) -> bool {
    const STOPWORDS: &[&str] = &[
        // English
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "could", "should", "may", "might", "can", "must",
        "shall", "of", "to", "in", "for", "on", "with", "at", "by", "from", "as", "or", "and",
        "but", "if", "then", "so", "than",
        // URL artifacts
        "http", "https", "www", "com", "org", "html", "php",
    ];
    STOPWORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let tokenizer = Tokenizer::default();
        let tokens = tokenizer.tokenize("The Rust Borrow-Checker, explained");
        assert_eq!(tokens, vec!["rust", "borrow", "checker", "explained"]);
    }

    #[test]
    fn test_url_artifacts_dropped() {
        let tokens = Tokenizer::default().tokenize("https://tokio/guide/index html");
        assert_eq!(tokens, vec!["tokio", "guide", "index"]);
    }

    #[test]
    fn test_min_length() {
        let tokenizer = Tokenizer { min_token_length: 3 };
        assert_eq!(tokenizer.tokenize("go to rust"), vec!["rust"]);
    }
}
