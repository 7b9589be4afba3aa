use std::collections::{HashMap, HashSet};

use crate::index::settings::IndexSettings;
use crate::tokenizer::{self, normalize};

/// One word of the user query, ready for matching.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTerm {
    /// Normalised query word.
    pub word: String,
    /// Normalised single-word synonyms that count as the same term.
    pub synonyms: Vec<String>,
    /// Whether the word may match as a prefix (last word of an unfinished query).
    pub prefix: bool,
    pub max_typos: u8,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    pub terms: Vec<QueryTerm>,
}

impl ParsedQuery {
    /// A query with no usable words matches every document.
    pub fn is_placeholder(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn words(&self) -> Vec<&str> {
        self.terms.iter().map(|t| t.word.as_str()).collect()
    }
}

pub struct QueryParser<'a> {
    settings: &'a IndexSettings,
    stop_words: HashSet<String>,
    synonyms: HashMap<String, Vec<String>>,
}

impl<'a> QueryParser<'a> {
    pub fn new(settings: &'a IndexSettings) -> Self {
        let stop_words = settings.stop_words.iter().map(|w| normalize(w)).collect();

        let mut synonyms: HashMap<String, Vec<String>> = HashMap::new();
        for (word, equivalents) in &settings.synonyms {
            let entry = synonyms.entry(normalize(word)).or_default();
            for equivalent in equivalents {
                let words = tokenizer::words(equivalent);
                if let [single] = words.as_slice() {
                    if !entry.contains(single) {
                        entry.push(single.clone());
                    }
                } else {
                    tracing::debug!("skipping multi-word synonym `{}` for `{}`", equivalent, word);
                }
            }
        }

        QueryParser {
            settings,
            stop_words,
            synonyms,
        }
    }

    pub fn parse(&self, query: &str) -> ParsedQuery {
        let words = tokenizer::words(query);
        let ends_mid_word = query.chars().last().is_some_and(|c| c.is_alphanumeric());
        let last_index = words.len().saturating_sub(1);

        let terms = words
            .into_iter()
            .enumerate()
            .filter(|(_, word)| !self.stop_words.contains(word))
            .map(|(idx, word)| QueryTerm {
                synonyms: self.synonyms.get(&word).cloned().unwrap_or_default(),
                prefix: idx == last_index && ends_mid_word,
                max_typos: self.settings.typo_tolerance.allowed_typos(&word),
                word,
            })
            .collect();

        ParsedQuery { terms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_parse() {
        let settings = IndexSettings::default();
        let parsed = QueryParser::new(&settings).parse("Wireless Headphones");
        assert_eq!(parsed.words(), vec!["wireless", "headphones"]);
        assert!(!parsed.terms[0].prefix);
        assert!(parsed.terms[1].prefix);
        assert_eq!(parsed.terms[0].max_typos, 1);
        assert_eq!(parsed.terms[1].max_typos, 2);
    }

    #[test]
    fn test_trailing_space_disables_prefix() {
        let settings = IndexSettings::default();
        let parsed = QueryParser::new(&settings).parse("chair ");
        assert!(!parsed.terms[0].prefix);
    }

    #[test]
    fn test_stop_words_removed() {
        let settings = IndexSettings {
            stop_words: ["the".to_string(), "of".to_string()].into(),
            ..Default::default()
        };
        let parser = QueryParser::new(&settings);
        assert_eq!(parser.parse("The Lord of the Rings").words(), vec!["lord", "rings"]);
        assert!(parser.parse("the of").is_placeholder());
    }

    #[test]
    fn test_synonyms_expanded() {
        let mut settings = IndexSettings::default();
        settings.synonyms.insert(
            "Phone".to_string(),
            vec!["smartphone".to_string(), "mobile phone".to_string()],
        );
        let parsed = QueryParser::new(&settings).parse("phone");
        assert_eq!(parsed.terms[0].synonyms, vec!["smartphone"]);
    }
}
