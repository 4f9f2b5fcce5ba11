//! Per-phase input grammar and artifact joining
//!
//! A *word-run* is a whitespace-free token whose core, after peeling any
//! leading and trailing punctuation, is non-empty and contains no
//! sentence-terminating punctuation. `"Hello,"` and `don't` are words;
//! `...` and `a.b` are not.

use crate::types::Phase;

const TERMINAL: &[char] = &['.', '!', '?'];

/// Punctuation that attaches to the previous text without a space
const ATTACHING: &[char] = &[
    '.', ',', '!', '?', ';', ':', ')', ']', '}', '-', '\u{2013}', '\u{2014}', '\u{2019}',
    '\u{201D}', '\u{2026}',
];

/// Validate a submission for `phase`
///
/// Returns the trimmed text to append, or `None` when the grammar rejects it.
/// Nothing is accepted while the room is still in the lobby.
#[must_use]
pub fn accept(phase: Phase, raw: &str) -> Option<&str> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    let ok = match phase {
        Phase::Waiting => false,
        Phase::SingleWord => is_word(text),
        Phase::ThreeWord => {
            !text.contains(['\n', '\r']) && {
                let words: Vec<&str> = text.split_whitespace().collect();
                (1..=3).contains(&words.len()) && words.iter().all(|w| is_word(w))
            }
        }
        Phase::Sentence => true,
    };
    ok.then_some(text)
}

/// Text to append for an accepted submission
///
/// A single separating space is prepended unless the artifact is empty or the
/// submission opens with attaching punctuation.
#[must_use]
pub fn joined(artifact: &str, accepted: &str) -> String {
    let attaches = accepted.starts_with(ATTACHING);
    if artifact.is_empty() || attaches {
        accepted.to_string()
    } else {
        format!(" {accepted}")
    }
}

fn is_word(token: &str) -> bool {
    if token.chars().any(char::is_whitespace) {
        return false;
    }
    let core = token.trim_matches(is_punctuation);
    !core.is_empty() && !core.contains(TERMINAL)
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '\u{2018}'..='\u{201F}' | '\u{2013}' | '\u{2014}' | '\u{2026}' | '\u{00AB}' | '\u{00BB}'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_word_accepts_plain_and_wrapped_words() {
        assert_eq!(accept(Phase::SingleWord, "Once"), Some("Once"));
        assert_eq!(accept(Phase::SingleWord, "  upon \n"), Some("upon"));
        assert_eq!(accept(Phase::SingleWord, "\"Hello,\""), Some("\"Hello,\""));
        assert_eq!(accept(Phase::SingleWord, "don't"), Some("don't"));
        assert_eq!(accept(Phase::SingleWord, "end."), Some("end."));
        assert_eq!(accept(Phase::SingleWord, "\u{201C}wow\u{201D}"), Some("\u{201C}wow\u{201D}"));
    }

    #[test]
    fn single_word_rejects_multiple_or_empty() {
        assert_eq!(accept(Phase::SingleWord, "two words"), None);
        assert_eq!(accept(Phase::SingleWord, ""), None);
        assert_eq!(accept(Phase::SingleWord, "   "), None);
        assert_eq!(accept(Phase::SingleWord, "..."), None);
        assert_eq!(accept(Phase::SingleWord, "a.b"), None);
        assert_eq!(accept(Phase::SingleWord, "stop!go"), None);
    }

    #[test]
    fn three_word_accepts_one_to_three() {
        assert!(accept(Phase::ThreeWord, "dark").is_some());
        assert!(accept(Phase::ThreeWord, "a dark night").is_some());
        assert!(accept(Phase::ThreeWord, "\"Run,\" she said.").is_some());
    }

    #[test]
    fn three_word_rejects_four_words_and_newlines() {
        assert_eq!(accept(Phase::ThreeWord, "one two three four"), None);
        assert_eq!(accept(Phase::ThreeWord, "one\ntwo"), None);
        assert_eq!(accept(Phase::ThreeWord, "one ... two"), None);
    }

    #[test]
    fn sentence_is_unrestricted() {
        let text = "It was the best of times. It was the worst of times!";
        assert_eq!(accept(Phase::Sentence, text), Some(text));
        assert!(accept(Phase::Sentence, "line one\nline two").is_some());
        assert_eq!(accept(Phase::Sentence, "   "), None);
    }

    #[test]
    fn lobby_accepts_nothing() {
        assert_eq!(accept(Phase::Waiting, "hello"), None);
    }

    #[test]
    fn join_spacing() {
        assert_eq!(joined("", "Once"), "Once");
        assert_eq!(joined("Once", "upon"), " upon");
        assert_eq!(joined("Once upon", ","), ",");
        assert_eq!(joined("Once upon a time", "."), ".");
        assert_eq!(joined("well", "-known"), "-known");
        assert_eq!(joined("said", ")"), ")");
        assert_eq!(joined("she", "\"Run\""), " \"Run\"");
    }
}
