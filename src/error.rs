use std::io;

use thiserror::Error;

/// Boxed static error type
pub type Err = Box<dyn std::error::Error + 'static>;

/// Anything that makes a grammar unusable. Raised while loading, never while
/// parsing, so nothing downstream of a failed load should run.
#[derive(Debug, Error)]
pub enum GrammarError {
  #[error("line {line}: {msg}")]
  Syntax { line: usize, msg: String },

  #[error("rule is not in Chomsky Normal Form: {rule}")]
  NotCnf { rule: String },

  #[error("rule {rule} has probability {value}, expected a value in (0, 1]")]
  Probability { rule: String, value: f64 },

  #[error("{symbol:?} can't be written back as a grammar symbol")]
  Symbol { symbol: String },

  #[error("empty ruleset")]
  Empty,

  #[error(transparent)]
  Io(#[from] io::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
  /// The chart holds a backpointer that cannot have been produced by a
  /// correct fill. The tree for this sentence can't be trusted.
  #[error("chart is inconsistent: {0}")]
  InternalConsistency(String),

  #[error("sentence has {len} tokens, limit is {max}")]
  TooLong { len: usize, max: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum TreeError {
  #[error("unexpected end of input")]
  UnexpectedEnd,

  #[error("unexpected {found:?} at offset {offset}")]
  Unexpected { found: String, offset: usize },

  #[error("trailing input at offset {0}")]
  Trailing(usize),

  #[error("node {label} has {arity} children, expected 0 or 2")]
  Arity { label: String, arity: usize },
}
