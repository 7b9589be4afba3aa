//! Word segmentation shared by indexing-time matching, query parsing and highlighting.

/// A word of the source text with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    /// Slice of the original text.
    pub text: &'a str,
    /// Lowercased form used for matching.
    pub normalized: String,
    /// Word index within the text.
    pub position: usize,
    pub byte_start: usize,
    pub byte_end: usize,
}

/// Split on every non-alphanumeric character.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_alphanumeric() {
            if start.is_none() {
                start = Some(idx);
            }
        } else if let Some(s) = start.take() {
            push_token(&mut tokens, text, s, idx);
        }
    }
    if let Some(s) = start {
        push_token(&mut tokens, text, s, text.len());
    }
    tokens
}

fn push_token<'a>(tokens: &mut Vec<Token<'a>>, text: &'a str, start: usize, end: usize) {
    let slice = &text[start..end];
    tokens.push(Token {
        text: slice,
        normalized: normalize(slice),
        position: tokens.len(),
        byte_start: start,
        byte_end: end,
    });
}

pub fn normalize(word: &str) -> String {
    word.to_lowercase()
}

/// Normalised words of `text`, in order.
pub fn words(text: &str) -> Vec<String> {
    tokenize(text).into_iter().map(|t| t.normalized).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_offsets() {
        let tokens = tokenize("Ergonomic office-chair, v2!");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["Ergonomic", "office", "chair", "v2"]);
        assert_eq!(tokens[1].byte_start, 10);
        assert_eq!(tokens[1].byte_end, 16);
        assert_eq!(tokens[3].position, 3);
        assert_eq!(tokens[0].normalized, "ergonomic");
    }

    #[test]
    fn test_tokenize_unicode() {
        let tokens = tokenize("Café Münster");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].normalized, "café");
        assert_eq!(&"Café Münster"[tokens[1].byte_start..tokens[1].byte_end], "Münster");
    }

    #[test]
    fn test_empty_and_separators_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" -- ,, ").is_empty());
    }
}
