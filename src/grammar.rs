use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::GrammarError;
use crate::parse_grammar::{is_name, is_terminal, parse};
use crate::rules::{Production, Rule};
use crate::syntree::SynTree;

/// `lhs -> terminal`, indexed by terminal
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalRule {
  pub lhs: String,
  pub prob: f64,
}

/// `lhs -> left right`, indexed by `left`
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryRule {
  pub lhs: String,
  pub right: String,
  pub prob: f64,
}

/// A PCFG in Chomsky Normal Form, indexed by right-hand side.
///
/// Probabilities are used as given: rules sharing a left-hand side don't have
/// to sum to one.
#[derive(Debug, Clone)]
pub struct Grammar {
  start: String,
  rules: Vec<Rule>,
  lexical: HashMap<String, Vec<LexicalRule>>,
  binary: HashMap<String, Vec<BinaryRule>>,
}

impl Grammar {
  /// Indexes `rules`, rejecting anything that isn't CNF or whose probability
  /// is outside (0, 1]. Symbols that `Display` couldn't write back in a form
  /// the reader accepts (a `''` label, a terminal with both quote kinds) are
  /// refused here rather than when the written grammar is reread.
  pub fn new(start: impl Into<String>, rules: Vec<Rule>) -> Result<Self, GrammarError> {
    if rules.is_empty() {
      return Err(GrammarError::Empty);
    }
    let start = start.into();
    check_name(&start)?;

    let mut lexical: HashMap<String, Vec<LexicalRule>> = HashMap::new();
    let mut binary: HashMap<String, Vec<BinaryRule>> = HashMap::new();

    for rule in rules.iter() {
      if !(rule.prob.is_finite() && rule.prob > 0.0 && rule.prob <= 1.0) {
        return Err(GrammarError::Probability {
          rule: rule.to_string(),
          value: rule.prob,
        });
      }

      check_name(&rule.symbol.name)?;
      match rule.productions.as_slice() {
        [Production::Terminal(word)] => {
          if !is_terminal(word) {
            return Err(GrammarError::Symbol {
              symbol: word.clone(),
            });
          }
          lexical.entry(word.clone()).or_default().push(LexicalRule {
            lhs: rule.symbol.name.clone(),
            prob: rule.prob,
          });
        }
        [Production::Nonterminal(left), Production::Nonterminal(right)] => {
          check_name(&left.name)?;
          check_name(&right.name)?;
          binary.entry(left.name.clone()).or_default().push(BinaryRule {
            lhs: rule.symbol.name.clone(),
            right: right.name.clone(),
            prob: rule.prob,
          });
        }
        _ => {
          return Err(GrammarError::NotCnf {
            rule: rule.to_string(),
          });
        }
      }
    }

    Ok(Self {
      start,
      rules,
      lexical,
      binary,
    })
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, GrammarError> {
    fs::read_to_string(path)?.parse()
  }

  pub fn start(&self) -> &str {
    &self.start
  }

  /// Rules in load order
  pub fn rules(&self) -> &[Rule] {
    &self.rules
  }

  /// Lexical rules whose right-hand side is `terminal`
  pub fn lexical(&self, terminal: &str) -> &[LexicalRule] {
    self.lexical.get(terminal).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Binary rules whose right-hand side starts with `left`
  pub fn binary_by_left(&self, left: &str) -> &[BinaryRule] {
    self.binary.get(left).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Probability of `lhs -> rhs`, where `rhs` is either one terminal or two
  /// nonterminals. A rule listed more than once counts with its highest
  /// probability, which is the copy a Viterbi parse uses.
  pub fn rule_probability(&self, lhs: &str, rhs: &[&str]) -> Option<f64> {
    match rhs {
      [word] => self
        .lexical(word)
        .iter()
        .filter(|r| r.lhs == lhs)
        .map(|r| r.prob)
        .max_by(f64::total_cmp),
      [left, right] => self
        .binary_by_left(left)
        .iter()
        .filter(|r| r.lhs == lhs && r.right == *right)
        .map(|r| r.prob)
        .max_by(f64::total_cmp),
      _ => None,
    }
  }

  /// Recomputes the probability of a derivation as the product of the rules
  /// it uses. None if the tree uses a rule this grammar doesn't have.
  pub fn score<U: AsRef<str>>(&self, tree: &SynTree<String, U>) -> Option<f64> {
    match tree {
      SynTree::Leaf(cons, word) => self.rule_probability(&cons.value, &[word.value.as_ref()]),
      SynTree::Branch(cons, left, right) => {
        let p = self.rule_probability(&cons.value, &[left.label().as_str(), right.label().as_str()])?;
        Some(p * self.score(left)? * self.score(right)?)
      }
    }
  }
}

fn check_name(name: &str) -> Result<(), GrammarError> {
  if is_name(name) {
    Ok(())
  } else {
    Err(GrammarError::Symbol {
      symbol: name.to_string(),
    })
  }
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "%start {}", self.start)?;
    for rule in self.rules.iter() {
      writeln!(f, "{}", rule)?;
    }
    Ok(())
  }
}

impl FromStr for Grammar {
  type Err = GrammarError;

  /// Parses a grammar from a string. The start symbol is taken from a
  /// `%start` directive, or else the first rule's symbol.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (start, rules) = parse(s)?;
    let start = match start {
      Some(start) => start,
      None => rules
        .first()
        .map(|r| r.symbol_str().to_string())
        .ok_or(GrammarError::Empty)?,
    };
    Self::new(start, rules)
  }
}
