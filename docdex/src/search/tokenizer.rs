//! Text normalization shared by indexing and querying

/// Words too common to carry ranking signal
pub const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "if", "in", "into", "is",
    "it", "its", "no", "not", "of", "on", "or", "so", "such", "that", "the", "their", "then",
    "there", "these", "they", "this", "to", "was", "will", "with",
];

/// A normalized token and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Lowercased term
    pub term: String,
    /// Byte offset of the token in the source text
    pub offset: usize,
    /// Byte length of the token in the source text
    pub len: usize,
}

/// Splits text into lowercase alphanumeric terms
#[derive(Debug, Clone)]
pub struct Tokenizer {
    min_len: usize,
}

impl Tokenizer {
    pub fn new(min_len: usize) -> Self {
        Tokenizer { min_len }
    }

    /// All tokens of `text` in order, with their source positions
    pub fn tokens(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut start = None;
        let mut term = String::new();
        let mut chars = 0;

        for (i, c) in text.char_indices() {
            if c.is_alphanumeric() {
                if start.is_none() {
                    start = Some(i);
                }
                term.extend(c.to_lowercase());
                chars += 1;
            } else if let Some(s) = start.take() {
                self.push(&mut tokens, std::mem::take(&mut term), chars, s, i);
                chars = 0;
            }
        }
        if let Some(s) = start {
            self.push(&mut tokens, term, chars, s, text.len());
        }

        tokens
    }

    /// Distinct terms of `text` in first-seen order
    pub fn unique_terms(&self, text: &str) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for token in self.tokens(text) {
            if !terms.contains(&token.term) {
                terms.push(token.term);
            }
        }
        terms
    }

    fn push(&self, tokens: &mut Vec<Token>, term: String, chars: usize, start: usize, end: usize) {
        if chars < self.min_len || STOP_WORDS.contains(&term.as_str()) {
            return;
        }
        tokens.push(Token {
            term,
            offset: start,
            len: end - start,
        });
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(text: &str) -> Vec<String> {
        Tokenizer::default().tokens(text).into_iter().map(|t| t.term).collect()
    }

    #[test]
    fn test_lowercase_and_split() {
        assert_eq!(terms("Agent-Handoff: MCP_server v2"), vec!["agent", "handoff", "mcp", "server", "v2"]);
    }

    #[test]
    fn test_drops_short_tokens_and_stop_words() {
        assert_eq!(terms("a I the cat is on it"), vec!["cat"]);
        assert!(terms("   ...  ").is_empty());
    }

    #[test]
    fn test_offsets_point_into_source() {
        let text = "Ünïcode wörds here";
        let tokens = Tokenizer::default().tokens(text);
        assert_eq!(tokens[0].term, "ünïcode");
        assert_eq!(&text[tokens[1].offset..tokens[1].offset + tokens[1].len], "wörds");
        assert_eq!(&text[tokens[2].offset..tokens[2].offset + tokens[2].len], "here");
    }

    #[test]
    fn test_unique_terms_keep_order() {
        let tokenizer = Tokenizer::default();
        assert_eq!(tokenizer.unique_terms("deploy Docs deploy docs"), vec!["deploy", "docs"]);
    }

    #[test]
    fn test_min_len_configurable() {
        let tokenizer = Tokenizer::new(4);
        let terms: Vec<_> = tokenizer.tokens("api docs guide").into_iter().map(|t| t.term).collect();
        assert_eq!(terms, vec!["docs", "guide"]);
    }
}
