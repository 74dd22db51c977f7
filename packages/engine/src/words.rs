// ============================================================================
// Word validation and grading
// ============================================================================
//
// Words are stored in one canonical form: trimmed, lowercased, with curly
// apostrophes folded to ASCII. Both sides of a comparison are normalized the
// same way, so grading is insensitive to case and surrounding whitespace.

use std::collections::HashSet;

use crate::error::{EngineError, EngineResult};

/// Languages the engine accepts for sessions and due queries.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "fr", "es", "de", "it"];

/// Longest accepted word, in characters after canonicalization.
pub const MAX_WORD_CHARS: usize = 50;

/// Largest custom word list for a single session.
pub const MAX_SESSION_WORDS: usize = 100;

pub fn is_supported_language(code: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&code)
}

pub fn validate_language(code: &str) -> EngineResult<()> {
    if is_supported_language(code) {
        Ok(())
    } else {
        Err(EngineError::validation(format!(
            "unsupported language: {code:?}"
        )))
    }
}

/// Canonicalizes one raw word. Accepts letters plus internal apostrophes and
/// hyphens; the first and last character must be a letter and punctuation
/// marks cannot touch each other.
pub fn canonicalize_word(raw: &str) -> EngineResult<String> {
    let folded: String = raw.trim().chars().map(fold_apostrophe).collect();
    let word = folded.to_lowercase();

    if word.is_empty() {
        return Err(EngineError::validation("word cannot be empty"));
    }

    let chars: Vec<char> = word.chars().collect();
    if chars.len() > MAX_WORD_CHARS {
        return Err(EngineError::validation(format!(
            "word is too long ({} characters, max {MAX_WORD_CHARS})",
            chars.len()
        )));
    }

    let first_is_letter = chars.first().is_some_and(|c| c.is_alphabetic());
    let last_is_letter = chars.last().is_some_and(|c| c.is_alphabetic());
    if !first_is_letter || !last_is_letter {
        return Err(EngineError::validation(format!(
            "word must start and end with a letter: {raw:?}"
        )));
    }

    let mut previous_was_mark = false;
    for &ch in &chars {
        if ch.is_alphabetic() {
            previous_was_mark = false;
        } else if ch == '\'' || ch == '-' {
            if previous_was_mark {
                return Err(EngineError::validation(format!(
                    "word has consecutive punctuation marks: {raw:?}"
                )));
            }
            previous_was_mark = true;
        } else {
            return Err(EngineError::validation(format!(
                "word contains unsupported character {ch:?}: {raw:?}"
            )));
        }
    }

    Ok(word)
}

/// Canonicalizes a custom word list, dropping duplicates while preserving
/// first-seen order. Any invalid entry fails the whole list.
pub fn prepare_word_list(raw_words: &[String]) -> EngineResult<Vec<String>> {
    if raw_words.is_empty() {
        return Err(EngineError::validation("word list cannot be empty"));
    }
    if raw_words.len() > MAX_SESSION_WORDS {
        return Err(EngineError::validation(format!(
            "word list has {} entries, max {MAX_SESSION_WORDS}",
            raw_words.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut words = Vec::with_capacity(raw_words.len());
    for raw in raw_words {
        let word = canonicalize_word(raw)?;
        if seen.insert(word.clone()) {
            words.push(word);
        }
    }
    Ok(words)
}

/// Whether the typed answer matches the expected word.
pub fn grade_answer(user_input: &str, expected: &str) -> bool {
    normalize_answer(user_input) == normalize_answer(expected)
}

fn normalize_answer(s: &str) -> String {
    s.trim().chars().map(fold_apostrophe).collect::<String>().to_lowercase()
}

fn fold_apostrophe(ch: char) -> char {
    if ch == '\u{2019}' {
        '\''
    } else {
        ch
    }
}

// ============================================================================
// Tests
// ============================================================================
