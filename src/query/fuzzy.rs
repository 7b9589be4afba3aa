use strsim::damerau_levenshtein;

use crate::query::parser::QueryTerm;

/// How a document word satisfied a query term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordMatch {
    pub typos: u8,
    /// Identical to the query word (no typo, prefix or synonym involved).
    pub exact: bool,
    /// Matched only part of the document word.
    pub prefix: bool,
}

/// Match one normalised document word against a query term.
pub fn match_word(term: &QueryTerm, token: &str, typos_allowed: bool) -> Option<WordMatch> {
    if token == term.word {
        return Some(WordMatch {
            typos: 0,
            exact: true,
            prefix: false,
        });
    }
    if term.synonyms.iter().any(|s| s == token) {
        return Some(WordMatch {
            typos: 0,
            exact: false,
            prefix: false,
        });
    }
    if term.prefix && token.starts_with(term.word.as_str()) {
        return Some(WordMatch {
            typos: 0,
            exact: false,
            prefix: true,
        });
    }

    let budget = if typos_allowed { term.max_typos } else { 0 };
    if budget == 0 {
        return None;
    }

    let word_len = term.word.chars().count();
    let token_len = token.chars().count();

    if word_len.abs_diff(token_len) <= budget as usize {
        let distance = damerau_levenshtein(&term.word, token);
        if distance <= budget as usize {
            return Some(WordMatch {
                typos: distance as u8,
                exact: false,
                prefix: false,
            });
        }
    }

    if term.prefix && token_len > word_len {
        let budget = budget as usize;
        let shortest = word_len.saturating_sub(budget).max(1);
        let longest = (word_len + budget).min(token_len - 1);
        let best = (shortest..=longest)
            .map(|len| {
                let head: String = token.chars().take(len).collect();
                damerau_levenshtein(&term.word, &head)
            })
            .min();
        if let Some(distance) = best.filter(|d| *d <= budget) {
            return Some(WordMatch {
                typos: distance as u8,
                exact: false,
                prefix: true,
            });
        }
    }

    None
}
