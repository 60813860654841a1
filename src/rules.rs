use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
  pub name: String,
}

impl Symbol {
  pub fn new(name: String) -> Self {
    Self { name }
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Production {
  Terminal(String),
  Nonterminal(Symbol),
}

impl fmt::Display for Production {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      // terminals containing a single quote are written double-quoted
      Self::Terminal(s) if s.contains('\'') => write!(f, "\"{}\"", s),
      Self::Terminal(s) => write!(f, "'{}'", s),
      Self::Nonterminal(s) => write!(f, "{}", s),
    }
  }
}

/// A weighted rule as written in a grammar file. Nothing here guarantees CNF;
/// that is checked when the rule is indexed into a [`Grammar`](crate::Grammar).
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
  pub symbol: Symbol,
  pub productions: Vec<Production>,
  pub prob: f64,
}

impl Rule {
  pub fn symbol_str(&self) -> &str {
    &self.symbol.name
  }

  pub fn lexical(lhs: &str, terminal: &str, prob: f64) -> Self {
    Self {
      symbol: Symbol::new(lhs.to_string()),
      productions: vec![Production::Terminal(terminal.to_string())],
      prob,
    }
  }

  pub fn binary(lhs: &str, left: &str, right: &str, prob: f64) -> Self {
    Self {
      symbol: Symbol::new(lhs.to_string()),
      productions: vec![
        Production::Nonterminal(Symbol::new(left.to_string())),
        Production::Nonterminal(Symbol::new(right.to_string())),
      ],
      prob,
    }
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ->", self.symbol)?;
    for p in self.productions.iter() {
      write!(f, " {}", p)?;
    }
    write!(f, " [{:?}]", self.prob)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display() {
    assert_eq!(Rule::binary("S", "NP", "VP", 1.0).to_string(), "S -> NP VP [1.0]");
    assert_eq!(Rule::lexical("NP", "dog", 0.25).to_string(), "NP -> 'dog' [0.25]");
    assert_eq!(Rule::lexical("VB", "don't", 0.5).to_string(), "VB -> \"don't\" [0.5]");
  }
}
