#[macro_use]
extern crate lazy_static;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

pub mod chart;
pub mod cky;
pub mod error;
pub mod estimate;
pub mod grammar;
pub mod parse_grammar;
pub mod rules;
pub mod syntree;
pub mod tokenize;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::chart::Chart;
pub use crate::cky::Parse;
use crate::cky::{best_parse, parse_chart};
pub use crate::error::{Err, GrammarError, ParseError, TreeError};
pub use crate::estimate::{EstimateOptions, estimate};
pub use crate::grammar::Grammar;
pub use crate::syntree::SynTree;

/// Per-call limits on parsing work
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
  /// Refuse sentences longer than this. Chart work grows with the cube of
  /// sentence length, so very long inputs can stall a batch.
  pub max_tokens: Option<usize>,
}

impl ParseOptions {
  /// Whether a sentence of `len` tokens is within the limit
  pub fn allows(&self, len: usize) -> bool {
    self.max_tokens.is_none_or(|max| len <= max)
  }
}

impl Grammar {
  pub fn parse_chart<'g, S: AsRef<str>>(&'g self, input: &[S]) -> Chart<'g> {
    parse_chart(self, input)
  }

  /// Most probable parse of `input`, or `Ok(None)` if the grammar can't
  /// derive it from the start symbol.
  pub fn parse<S: AsRef<str>>(&self, input: &[S]) -> Result<Option<Parse>, ParseError> {
    self.parse_with(input, &ParseOptions::default())
  }

  pub fn parse_with<S: AsRef<str>>(
    &self,
    input: &[S],
    opts: &ParseOptions,
  ) -> Result<Option<Parse>, ParseError> {
    if let Some(max) = opts.max_tokens {
      if !opts.allows(input.len()) {
        debug!(len = input.len(), max, "sentence over token limit");
        return Err(ParseError::TooLong {
          len: input.len(),
          max,
        });
      }
    }

    let chart = self.parse_chart(input);
    best_parse(&chart, self, input)
  }

  /// Parses every sentence independently; results are in input order. With
  /// the `parallel` feature sentences are spread over the rayon pool.
  pub fn parse_batch<S: AsRef<str> + Sync>(
    &self,
    sentences: &[Vec<S>],
    opts: &ParseOptions,
  ) -> Vec<Result<Option<Parse>, ParseError>> {
    #[cfg(feature = "parallel")]
    let iter = sentences.par_iter();
    #[cfg(not(feature = "parallel"))]
    let iter = sentences.iter();

    iter.map(|s| self.parse_with(s, opts)).collect()
  }
}

#[cfg(test)]
fn grammar(src: &str) -> Grammar {
  src.parse().unwrap()
}

#[test]
fn test_single_rule_grammar() {
  let g = grammar("S -> 'a' [1.0]");
  let parse = g.parse(&["a"]).unwrap().unwrap();
  assert_eq!(parse.tree.to_string(), "(S a)");
  assert_eq!(parse.prob, 1.0);
}

#[test]
fn test_dog_barks() {
  let g = grammar("S -> NP VP [1.0]\nNP -> 'dog' [1.0]\nVP -> 'barks' [1.0]");
  let parse = g.parse(&["dog", "barks"]).unwrap().unwrap();
  assert_eq!(parse.tree.to_string(), "(S (NP dog) (VP barks))");
  assert_eq!(parse.prob, 1.0);
}

#[test]
fn test_unparsable_is_not_an_error() {
  let g = grammar("S -> 'a' [1.0]");
  assert_eq!(g.parse(&["b"]), Ok(None));
  assert_eq!(g.parse(&["a", "a"]), Ok(None));
  assert_eq!(g.parse::<&str>(&[]), Ok(None));

  // derivable, but not from the start symbol
  let g = grammar("S -> 'a' [1.0]\nT -> 'b' [1.0]");
  assert_eq!(g.parse(&["b"]), Ok(None));
}

#[test]
fn test_single_token_is_a_leaf() {
  let g = grammar("S -> A B [0.5]\nS -> 'a' [0.5]\nA -> 'a' [1.0]\nB -> 'a' [1.0]");
  let parse = g.parse(&["a"]).unwrap().unwrap();
  assert!(parse.tree.is_leaf());
  assert_eq!(parse.tree.depth(), 1);
  assert_eq!(parse.tree.to_string(), "(S a)");
}

#[cfg(test)]
const PP_ATTACHMENT: &str = "
  S -> NP VP [1.0]
  VP -> V NP [0.6] | VP PP [0.4]
  NP -> NP PP [0.2] | DT NN [0.5] | 'I' [0.3]
  PP -> P NP [1.0]
  V -> 'saw' [1.0]
  DT -> 'the' [0.6] | 'a' [0.4]
  NN -> 'man' [0.5] | 'telescope' [0.5]
  P -> 'with' [1.0]
";

#[cfg(test)]
fn saw_the_man() -> Vec<&'static str> {
  crate::tokenize::tokenize("I saw the man with a telescope")
}

#[test]
fn test_prefers_more_probable_attachment() {
  let g = grammar(PP_ATTACHMENT);
  let parse = g.parse(&saw_the_man()).unwrap().unwrap();
  // VP attachment: 0.4 * 0.6 vs NP attachment: 0.6 * 0.2
  assert_eq!(
    parse.tree.to_string(),
    "(S (NP I) (VP (VP (V saw) (NP (DT the) (NN man))) (PP (P with) (NP (DT a) (NN telescope)))))"
  );
}

#[test]
fn test_probability_is_product_of_rules() {
  let g = grammar(PP_ATTACHMENT);
  let parse = g.parse(&saw_the_man()).unwrap().unwrap();
  assert_eq!(g.score(&parse.tree), Some(parse.prob));

  let other: SynTree<String, String> =
    "(S (NP I) (VP (V saw) (NP (NP (DT the) (NN man)) (PP (P with) (NP (DT a) (NN telescope))))))"
      .parse()
      .unwrap();
  let other_prob = g.score(&other).unwrap();
  assert!(other_prob > 0.0 && other_prob < parse.prob);
}

#[test]
fn test_repeated_rule_scores_like_the_chart() {
  let g = grammar("S -> 'a' [0.25]\nS -> 'a' [0.5]");
  let parse = g.parse(&["a"]).unwrap().unwrap();
  assert_eq!(parse.prob, 0.5);
  assert_eq!(g.score(&parse.tree), Some(parse.prob));

  let g = grammar("S -> S S [0.2] | S S [0.4] | 'a' [1.0]");
  let parse = g.parse(&["a", "a"]).unwrap().unwrap();
  assert_eq!(parse.prob, 0.4);
  assert_eq!(g.score(&parse.tree), Some(parse.prob));
}

#[test]
fn test_low_probability_rule_does_not_change_best() {
  let g = grammar(PP_ATTACHMENT);
  let before = g.parse(&saw_the_man()).unwrap().unwrap();

  let mut rules = g.rules().to_vec();
  rules.push(crate::rules::Rule::binary("S", "NP", "VP", 1e-9));
  rules.push(crate::rules::Rule::binary("VP", "V", "NP", 1e-9));
  rules.push(crate::rules::Rule::lexical("NN", "with", 1e-9));
  let g2 = Grammar::new(g.start(), rules).unwrap();

  let after = g2.parse(&saw_the_man()).unwrap().unwrap();
  assert_eq!(after, before);
}

#[test]
fn test_parse_is_deterministic() {
  let g = grammar(PP_ATTACHMENT);
  let first = g.parse(&saw_the_man()).unwrap().unwrap();
  for _ in 0..5 {
    let again = g.parse(&saw_the_man()).unwrap().unwrap();
    assert_eq!(again.tree, first.tree);
    assert_eq!(again.prob.to_bits(), first.prob.to_bits());
  }
}

#[test]
fn test_ties_keep_first_derivation() {
  // both bracketings of "a a a" score 0.25; the 1+2 split is tried first
  let g = grammar("S -> S S [0.5] | 'a' [1.0]");
  let parse = g.parse(&["a", "a", "a"]).unwrap().unwrap();
  assert_eq!(parse.prob, 0.25);
  assert_eq!(parse.tree.to_string(), "(S (S a) (S (S a) (S a)))");
}

#[test]
fn test_round_trip_through_brackets() {
  let g = grammar(PP_ATTACHMENT);
  let parse = g.parse(&saw_the_man()).unwrap().unwrap();
  let reread: SynTree<String, String> = parse.tree.to_string().parse().unwrap();
  assert!(reread.same_shape(&parse.tree));
  assert_eq!(reread, parse.tree);
}

#[test]
fn test_token_limit() {
  let g = grammar(PP_ATTACHMENT);
  let opts = ParseOptions {
    max_tokens: Some(3),
  };
  assert_eq!(
    g.parse_with(&saw_the_man(), &opts),
    Err(ParseError::TooLong { len: 7, max: 3 })
  );
  assert!(g.parse_with(&["I", "saw", "I"], &opts).unwrap().is_some());

  assert!(opts.allows(3));
  assert!(!opts.allows(4));
  assert!(ParseOptions::default().allows(usize::MAX));
}

#[test]
fn test_batch_preserves_order() {
  let g = grammar(PP_ATTACHMENT);
  let sentences = vec![saw_the_man(), vec!["telescope"], vec!["I", "saw", "a", "man"]];
  let results = g.parse_batch(&sentences, &ParseOptions::default());
  assert_eq!(results.len(), 3);
  assert_eq!(results[0], g.parse(&sentences[0]));
  assert_eq!(results[1], Ok(None));
  assert_eq!(
    results[2].as_ref().unwrap().as_ref().unwrap().tree.to_string(),
    "(S (NP I) (VP (V saw) (NP (DT a) (NN man))))"
  );
}

#[test]
fn test_annotated_labels_are_opaque() {
  let g = grammar("S^ -> NP^S VP^S [1.0]\nNP^S -> 'dog' [1.0]\nVP^S -> 'barks' [1.0]\nNP -> 'dog' [1.0]");
  let parse = g.parse(&["dog", "barks"]).unwrap().unwrap();
  assert_eq!(parse.tree.to_string(), "(S^ (NP^S dog) (VP^S barks))");
  assert_eq!(parse.tree.strip_annotations().to_string(), "(S (NP dog) (VP barks))");
}
