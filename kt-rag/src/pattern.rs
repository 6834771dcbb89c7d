//! SQL `LIKE` patterns used by substring search.
//!
//! Keywords are wrapped as `%keyword%` with `\`, `%` and `_` escaped so they
//! match literally. Backends that speak `LIKE` natively pass patterns
//! through; the others use [`LikeMatcher`] or [`like_literal`].

use regex::Regex;

use crate::error::{RagError, Result};

/// Build a "contains" pattern that matches `keyword` literally.
pub fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    AnySeq,
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => tokens.push(Token::Literal(escaped)),
                None => tokens.push(Token::Literal('\\')),
            },
            '%' => {
                if tokens.last() != Some(&Token::AnySeq) {
                    tokens.push(Token::AnySeq);
                }
            }
            '_' => tokens.push(Token::AnyChar),
            other => tokens.push(Token::Literal(other)),
        }
    }
    tokens
}

fn to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    for token in tokenize(pattern) {
        match token {
            Token::AnySeq => out.push_str(".*"),
            Token::AnyChar => out.push('.'),
            Token::Literal(c) => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out
}

/// A set of `LIKE` patterns compiled into one anchored alternation.
///
/// Matching is case-sensitive and `_` and `%` span newlines.
#[derive(Debug, Clone)]
pub struct LikeMatcher {
    regex: Regex,
}

impl LikeMatcher {
    /// Compile `patterns`. A text matches if any pattern matches all of it.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let alternation = patterns.iter().map(|p| to_regex(p)).collect::<Vec<_>>().join("|");
        let regex = Regex::new(&format!("(?s)^(?:{alternation})$"))
            .map_err(|e| RagError::PatternError(e.to_string()))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Recover the literal keyword from a `%keyword%` pattern.
///
/// Returns `None` when the pattern contains wildcards other than the
/// surrounding `%`s.
pub fn like_literal(pattern: &str) -> Option<String> {
    let tokens = tokenize(pattern);
    let inner: &[Token] = match tokens.as_slice() {
        [Token::AnySeq, inner @ .., Token::AnySeq] => inner,
        [Token::AnySeq] => &[],
        other => other,
    };
    inner
        .iter()
        .map(|token| match token {
            Token::Literal(c) => Some(*c),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn like_matches(pattern: &str, text: &str) -> bool {
        LikeMatcher::new(&[pattern.to_string()]).unwrap().is_match(text)
    }

    #[test]
    fn escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn matches_contains_semantics() {
        let pattern = like_pattern("Paris");
        assert!(like_matches(&pattern, "Paris is referenced on page 3."));
        assert!(like_matches(&pattern, "in Paris"));
        assert!(!like_matches(&pattern, "in paris"));
        assert!(!like_matches(&pattern, "Rome"));
    }

    #[test]
    fn escaped_wildcards_match_literally() {
        let pattern = like_pattern("10%");
        assert!(like_matches(&pattern, "a 10% discount"));
        assert!(!like_matches(&pattern, "a 10 discount"));

        let underscore = like_pattern("a_b");
        assert!(like_matches(&underscore, "xx a_b yy"));
        assert!(!like_matches(&underscore, "xx acb yy"));
    }

    #[test]
    fn raw_wildcards_still_work() {
        assert!(like_matches("P_ris", "Paris"));
        assert!(like_matches("%is", "Paris"));
        assert!(!like_matches("P_ris", "Parris"));
    }

    #[test]
    fn any_pattern_in_the_set_matches() {
        let matcher = LikeMatcher::new(&[like_pattern("Rome"), like_pattern("Paris")]).unwrap();
        assert!(matcher.is_match("We flew to Paris."));
        assert!(matcher.is_match("Rome\nand more"));
        assert!(!matcher.is_match("Berlin"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let pattern = like_pattern("a.b(c)*");
        assert!(like_matches(&pattern, "x a.b(c)* y"));
        assert!(!like_matches(&pattern, "x aXb(c) y"));
    }

    #[test]
    fn wildcards_span_lines() {
        assert!(like_matches(&like_pattern("two"), "one\ntwo\nthree"));
        assert!(like_matches("a_b", "a\nb"));
    }

    #[test]
    fn literal_round_trips() {
        assert_eq!(like_literal(&like_pattern("50%_off")).as_deref(), Some("50%_off"));
        assert_eq!(like_literal("%a_b%"), None);
    }

    proptest! {
        #[test]
        fn any_keyword_matches_text_containing_it(
            prefix in "[a-z %_]{0,8}",
            keyword in "[a-zA-Z0-9 %_\\\\]{1,8}",
            suffix in "[a-z %_]{0,8}",
        ) {
            let text = format!("{prefix}{keyword}{suffix}");
            prop_assert!(like_matches(&like_pattern(&keyword), &text));
        }

        #[test]
        fn matching_agrees_with_contains(
            keyword in "[ab%_]{1,4}",
            text in "[ab%_]{0,10}",
        ) {
            prop_assert_eq!(like_matches(&like_pattern(&keyword), &text), text.contains(&keyword));
        }
    }
}
