use std::collections::HashMap;

use tracing::debug;

use crate::error::GrammarError;
use crate::grammar::Grammar;
use crate::rules::Rule;
use crate::syntree::SynTree;

#[derive(Debug, Clone, Copy, Default)]
pub struct EstimateOptions {
  /// Relabel every node as `label^parent` (the root as `label^`)
  pub parent_annotation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RuleKey {
  Lexical(String, String),
  Binary(String, String, String),
}

impl RuleKey {
  fn lhs(&self) -> &str {
    match self {
      Self::Lexical(lhs, _) | Self::Binary(lhs, _, _) => lhs,
    }
  }
}

/// Production counts in first-seen order
#[derive(Debug, Default)]
struct Counts {
  rules: Vec<(RuleKey, usize)>,
  index: HashMap<RuleKey, usize>,
  lhs: HashMap<String, usize>,
}

impl Counts {
  fn bump(&mut self, key: RuleKey) {
    *self.lhs.entry(key.lhs().to_string()).or_default() += 1;
    match self.index.get(&key) {
      Some(&idx) => self.rules[idx].1 += 1,
      None => {
        self.index.insert(key.clone(), self.rules.len());
        self.rules.push((key, 1));
      }
    }
  }
}

fn annotate(label: &str, parent: Option<&str>, opts: EstimateOptions) -> String {
  if opts.parent_annotation {
    format!("{}^{}", label, parent.unwrap_or(""))
  } else {
    label.to_string()
  }
}

fn count_tree(
  counts: &mut Counts,
  tree: &SynTree<String, String>,
  parent: Option<&str>,
  opts: EstimateOptions,
) {
  let lhs = annotate(tree.label(), parent, opts);
  match tree {
    SynTree::Leaf(_, word) => counts.bump(RuleKey::Lexical(lhs, word.value.clone())),
    SynTree::Branch(cons, left, right) => {
      let here = Some(cons.value.as_str());
      counts.bump(RuleKey::Binary(
        lhs,
        annotate(left.label(), here, opts),
        annotate(right.label(), here, opts),
      ));
      count_tree(counts, left, here, opts);
      count_tree(counts, right, here, opts);
    }
  }
}

/// Relative-frequency estimate of a PCFG from a treebank: every production
/// gets count(rule) / count(lhs). The first tree's root is the start symbol.
pub fn estimate<'a, I>(trees: I, opts: EstimateOptions) -> Result<Grammar, GrammarError>
where
  I: IntoIterator<Item = &'a SynTree<String, String>>,
{
  let mut counts = Counts::default();
  let mut start = None;
  let mut n_trees = 0;

  for tree in trees {
    if start.is_none() {
      start = Some(annotate(tree.label(), None, opts));
    }
    count_tree(&mut counts, tree, None, opts);
    n_trees += 1;
  }

  let start = start.ok_or(GrammarError::Empty)?;
  debug!(
    trees = n_trees,
    rules = counts.rules.len(),
    nonterminals = counts.lhs.len(),
    "estimated grammar"
  );

  let rules = counts
    .rules
    .iter()
    .map(|(key, n)| {
      let total = counts.lhs[key.lhs()] as f64;
      let prob = *n as f64 / total;
      match key {
        RuleKey::Lexical(lhs, word) => Rule::lexical(lhs, word, prob),
        RuleKey::Binary(lhs, left, right) => Rule::binary(lhs, left, right, prob),
      }
    })
    .collect();

  Grammar::new(start, rules)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::syntree::parse_trees;

  const TREEBANK: &str = "
    (S (NP dog) (VP barks))
    (S (NP (DT the) (NN dog)) (VP barks))
    (S (NP cat) (VP (V sees) (NP dog)))
  ";

  #[test]
  fn test_relative_frequencies() {
    let trees = parse_trees(TREEBANK).unwrap();
    let g = estimate(&trees, EstimateOptions::default()).unwrap();

    assert_eq!(g.start(), "S");
    assert_eq!(g.rule_probability("S", &["NP", "VP"]), Some(1.0));
    // NP: dog x2, cat x1, DT NN x1
    assert_eq!(g.rule_probability("NP", &["dog"]), Some(0.5));
    assert_eq!(g.rule_probability("NP", &["cat"]), Some(0.25));
    assert_eq!(g.rule_probability("NP", &["DT", "NN"]), Some(0.25));
    // VP: barks x2, V NP x1
    assert_eq!(g.rule_probability("VP", &["barks"]), Some(2.0 / 3.0));
    assert_eq!(g.rule_probability("VP", &["V", "NP"]), Some(1.0 / 3.0));

    // first-seen order
    assert_eq!(g.rules()[0], Rule::binary("S", "NP", "VP", 1.0));
    assert_eq!(g.rules()[1], Rule::lexical("NP", "dog", 0.5));
  }

  #[test]
  fn test_parent_annotation() {
    let trees = parse_trees(TREEBANK).unwrap();
    let g = estimate(
      &trees,
      EstimateOptions {
        parent_annotation: true,
      },
    )
    .unwrap();

    assert_eq!(g.start(), "S^");
    assert_eq!(g.rule_probability("S^", &["NP^S", "VP^S"]), Some(1.0));
    // NP under S: dog, DT NN, cat
    assert_eq!(g.rule_probability("NP^S", &["dog"]), Some(1.0 / 3.0));
    assert_eq!(g.rule_probability("NP^VP", &["dog"]), Some(1.0));
    assert_eq!(g.rule_probability("VP^S", &["V^VP", "NP^VP"]), Some(1.0 / 3.0));
    assert_eq!(g.rule_probability("NP", &["dog"]), None);
  }

  #[test]
  fn test_estimated_grammar_parses_its_treebank() {
    let trees = parse_trees(TREEBANK).unwrap();
    let g = estimate(&trees, EstimateOptions { parent_annotation: true }).unwrap();
    for tree in trees.iter() {
      let parse = g.parse(&tree.words()).unwrap().unwrap();
      assert_eq!(parse.tree.strip_annotations(), *tree);
    }
  }

  #[test]
  fn test_punctuation_labels_round_trip() {
    let trees = parse_trees("(S (NP dog) (. .))\n(S (NP it) (VP (VB 's) (-NONE- *T*)))").unwrap();
    for parent_annotation in [false, true] {
      let g = estimate(&trees, EstimateOptions { parent_annotation }).unwrap();
      let reread: Grammar = g.to_string().parse().unwrap();
      assert_eq!(reread.start(), g.start());
      assert_eq!(reread.rules(), g.rules());

      let parse = reread.parse(&["dog", "."]).unwrap().unwrap();
      assert_eq!(parse.tree.strip_annotations(), trees[0]);
    }
  }

  #[test]
  fn test_unwritable_labels_are_refused() {
    let trees = parse_trees("(S (NP dog) ('' ''))").unwrap();
    assert!(matches!(
      estimate(&trees, EstimateOptions::default()),
      Err(GrammarError::Symbol { .. })
    ));
  }

  #[test]
  fn test_empty_treebank() {
    let none: Vec<SynTree<String, String>> = Vec::new();
    assert!(matches!(
      estimate(&none, EstimateOptions::default()),
      Err(GrammarError::Empty)
    ));
  }
}
