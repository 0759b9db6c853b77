//! String helpers shared by the text featurizers

use std::collections::BTreeMap;
use std::sync::Arc;

use featurizer_core::{Error, Result};
use regex::Regex;

/// Transformation applied to documents before they are tokenized in training
pub type StringDecorator = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Delimiter the vectorizers split documents on
pub const TOKEN_DELIMITER: char = ' ';

/// Lowercase every character
pub fn to_lower(input: &str) -> String {
    input.to_lowercase()
}

/// Uppercase every character
pub fn to_upper(input: &str) -> String {
    input.to_uppercase()
}

/// Strip leading occurrences of `ch`
pub fn trim_left(input: &str, ch: char) -> &str {
    input.trim_start_matches(ch)
}

/// Strip trailing occurrences of `ch`
pub fn trim_right(input: &str, ch: char) -> &str {
    input.trim_end_matches(ch)
}

/// Strip leading and trailing occurrences of `ch`
pub fn trim(input: &str, ch: char) -> &str {
    input.trim_matches(ch)
}

/// Replace ASCII punctuation with spaces and collapse whitespace runs to one space
pub fn trim_and_replace(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut previous_space = false;
    for ch in input.chars() {
        let ch = if ch.is_ascii_punctuation() { ' ' } else { ch };
        if ch.is_whitespace() {
            if !previous_space {
                output.push(' ');
            }
            previous_space = true;
        } else {
            output.push(ch);
            previous_space = false;
        }
    }
    output
}

/// Split `input` on `delimiter`, skipping empty tokens
///
/// Runs of delimiters count as one and leading or trailing delimiters
/// produce no tokens. Tokens borrow from `input`.
pub fn parse(input: &str, delimiter: char) -> impl Iterator<Item = &str> {
    input.split(delimiter).filter(|token| !token.is_empty())
}

/// Every match of `token` in `input`, in order
///
/// With a pattern such as `[^\s]+` this splits on whitespace runs. Tokens
/// borrow from `input`.
pub fn parse_regex<'a>(input: &'a str, token: &'a Regex) -> impl Iterator<Item = &'a str> + 'a {
    token.find_iter(input).map(|m| m.as_str())
}

/// Word n-grams of every size in `ngram_range_min..=ngram_range_max`
///
/// Whitespace and ASCII punctuation separate words. N-grams are joined with
/// a single space and listed by size, then by position.
pub fn parse_ngram_word(
    input: &str,
    ngram_range_min: usize,
    ngram_range_max: usize,
) -> Result<Vec<String>> {
    if ngram_range_min == 0 || ngram_range_max < ngram_range_min {
        return Err(Error::InvalidArgument(format!(
            "Invalid n-gram range {ngram_range_min}..={ngram_range_max}"
        )));
    }

    let words: Vec<&str> = input
        .split(|ch: char| ch.is_whitespace() || ch.is_ascii_punctuation())
        .filter(|word| !word.is_empty())
        .collect();
    if words.is_empty() {
        return Err(Error::InvalidArgument("Input contains no words".into()));
    }

    let mut ngrams = Vec::new();
    for size in ngram_range_min..=ngram_range_max.min(words.len()) {
        ngrams.extend(words.windows(size).map(|window| window.join(" ")));
    }
    Ok(ngrams)
}

/// Count the tokens of one document
///
/// Keys borrow from `input`, so no string is allocated per candidate token.
/// Iteration order is lexicographic.
pub fn term_frequencies(input: &str) -> BTreeMap<&str, u32> {
    let mut counts = BTreeMap::new();
    for token in parse(input, TOKEN_DELIMITER) {
        *counts.entry(token).or_insert(0u32) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("this is a document"; "single spaces")]
    #[test_case("this   is a   document "; "repeated spaces")]
    #[test_case(" this is   a document"; "leading space")]
    #[test_case(" this   is a   document  "; "both ends")]
    fn test_parse_collapses_delimiters(input: &str) {
        let tokens: Vec<&str> = parse(input, ' ').collect();
        assert_eq!(tokens, vec!["this", "is", "a", "document"]);
    }

    #[test_case(""; "empty")]
    #[test_case(" "; "one space")]
    #[test_case("  "; "two spaces")]
    fn test_parse_without_tokens(input: &str) {
        assert_eq!(parse(input, ' ').count(), 0);
    }

    #[test_case("this is a document"; "single spaces")]
    #[test_case("this   is a   document "; "repeated spaces")]
    #[test_case(" this is   a document"; "leading space")]
    #[test_case(" this is a document "; "padded")]
    #[test_case(" this   is a   document  "; "both ends")]
    fn test_parse_regex_non_whitespace(input: &str) {
        let token = Regex::new(r"[^\s]+").unwrap();
        let tokens: Vec<&str> = parse_regex(input, &token).collect();
        assert_eq!(tokens, vec!["this", "is", "a", "document"]);
    }

    #[test]
    fn test_parse_regex_custom_pattern() {
        let token = Regex::new(r"[a-z]+").unwrap();
        let tokens: Vec<&str> = parse_regex("bi-grams, are cool! 42", &token).collect();
        assert_eq!(tokens, vec!["bi", "grams", "are", "cool"]);
        assert_eq!(parse_regex("  ", &token).count(), 0);
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_lower("THIS IS THE FIRST DOCUMENT."), "this is the first document.");
        assert_eq!(to_upper("this is the first document."), "THIS IS THE FIRST DOCUMENT.");
    }

    #[test]
    fn test_trims() {
        assert_eq!(trim_left("    this is the first document.", ' '), "this is the first document.");
        assert_eq!(trim_right("this is the first document.        ", ' '), "this is the first document.");
        assert_eq!(trim("     this is the first document.     ", ' '), "this is the first document.");
    }

    #[test]
    fn test_trim_and_replace() {
        assert_eq!(
            trim_and_replace(" ! is  this the   * first#document  ?   "),
            " is this the first document "
        );
    }

    #[test]
    fn test_ngrams() {
        let input = "? this$is a   document  &";
        assert_eq!(parse_ngram_word(input, 1, 1).unwrap(), vec!["this", "is", "a", "document"]);
        assert_eq!(
            parse_ngram_word(input, 2, 3).unwrap(),
            vec!["this is", "is a", "a document", "this is a", "is a document"]
        );
        assert_eq!(parse_ngram_word(input, 4, 4).unwrap(), vec!["this is a document"]);
        assert_eq!(
            parse_ngram_word(" bi-grams    are cool! ", 1, 2).unwrap(),
            vec!["bi", "grams", "are", "cool", "bi grams", "grams are", "are cool"]
        );
    }

    #[test]
    fn test_ngram_errors() {
        assert!(matches!(parse_ngram_word(" ", 1, 1), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_ngram_word("hi", 0, 3), Err(Error::InvalidArgument(_))));
        assert!(parse_ngram_word("hi", 3, 2).is_err());
    }

    #[test]
    fn test_term_frequencies_are_ordered() {
        let counts: Vec<(&str, u32)> = term_frequencies("b a  b c b").into_iter().collect();
        assert_eq!(counts, vec![("a", 1), ("b", 3), ("c", 1)]);
    }

    proptest! {
        #[test]
        fn prop_parse_ignores_extra_delimiters(words in proptest::collection::vec("[a-z]{1,8}", 0..10), pad in 1usize..4) {
            let spaced = words.join(" ".repeat(pad).as_str());
            let padded = format!("{}{}{}", " ".repeat(pad), spaced, " ".repeat(pad));
            let tokens: Vec<&str> = parse(&padded, ' ').collect();
            prop_assert_eq!(tokens, words.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
