use regex::Regex;

/// Splits a raw sentence into grammar terminals: runs of word characters and
/// apostrophes, and single punctuation marks. Anything else is dropped.
///
/// ```
/// assert_eq!(
///   pcky::tokenize::tokenize("I don't know, do you?"),
///   vec!["I", "don't", "know", ",", "do", "you", "?"]
/// );
/// ```
pub fn tokenize(sentence: &str) -> Vec<&str> {
  regex_static!(TOKEN, r"[\w']+|[.,!?;]");
  TOKEN.find_iter(sentence).map(|m| m.as_str()).collect()
}
