use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::TreeError;

#[derive(Debug, PartialEq, Clone)]
pub struct Constituent<T> {
  pub value: T,
  pub span: (usize, usize),
}

impl<T> fmt::Display for Constituent<T>
where
  T: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.span.0, self.span.1, self.value)
  }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Word<U> {
  pub value: U,
  pub span: (usize, usize),
}

impl<U> fmt::Display for Word<U>
where
  U: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.span.0, self.span.1, self.value)
  }
}

/// A binary derivation tree. Every node is either a branch with exactly two
/// children or a preterminal leaf carrying its label and the word it covers.
#[derive(Debug, PartialEq, Clone)]
pub enum SynTree<T, U> {
  Branch(Constituent<T>, Box<SynTree<T, U>>, Box<SynTree<T, U>>),
  Leaf(Constituent<T>, Word<U>),
}

impl<T, U> SynTree<T, U> {
  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf(_, _))
  }

  pub fn constituent(&self) -> &Constituent<T> {
    match self {
      Self::Branch(c, _, _) | Self::Leaf(c, _) => c,
    }
  }

  pub fn label(&self) -> &T {
    &self.constituent().value
  }

  pub fn span(&self) -> (usize, usize) {
    self.constituent().span
  }

  pub fn get_leaf(&self) -> Option<&Word<U>> {
    match self {
      Self::Leaf(_, w) => Some(w),
      _ => None,
    }
  }

  pub fn get_children(&self) -> Option<(&SynTree<T, U>, &SynTree<T, U>)> {
    match self {
      Self::Branch(_, l, r) => Some((&**l, &**r)),
      _ => None,
    }
  }

  /// Number of nodes on the longest root-to-leaf path; a lone leaf has depth 1
  pub fn depth(&self) -> usize {
    match self {
      Self::Leaf(_, _) => 1,
      Self::Branch(_, l, r) => 1 + l.depth().max(r.depth()),
    }
  }

  /// Words in left-to-right order
  pub fn words(&self) -> Vec<&U> {
    let mut out = Vec::new();
    self.collect_words(&mut out);
    out
  }

  fn collect_words<'a>(&'a self, out: &mut Vec<&'a U>) {
    match self {
      Self::Leaf(_, w) => out.push(&w.value),
      Self::Branch(_, l, r) => {
        l.collect_words(out);
        r.collect_words(out);
      }
    }
  }

  pub fn map<V, W>(
    &self,
    map_branch: fn(&Constituent<T>) -> V,
    map_leaf: fn(&Word<U>) -> W,
  ) -> SynTree<V, W> {
    match self {
      Self::Branch(t, l, r) => SynTree::Branch(
        Constituent {
          span: t.span,
          value: map_branch(t),
        },
        Box::new(l.map(map_branch, map_leaf)),
        Box::new(r.map(map_branch, map_leaf)),
      ),
      Self::Leaf(t, u) => SynTree::Leaf(
        Constituent {
          span: t.span,
          value: map_branch(t),
        },
        Word {
          span: u.span,
          value: map_leaf(u),
        },
      ),
    }
  }

  /// True if both trees have the same labels in the same shape, ignoring
  /// words and spans
  pub fn same_shape<V, W>(&self, other: &SynTree<V, W>) -> bool
  where
    T: PartialEq<V>,
  {
    match (self, other) {
      (Self::Leaf(a, _), SynTree::Leaf(b, _)) => a.value == b.value,
      (Self::Branch(a, al, ar), SynTree::Branch(b, bl, br)) => {
        a.value == b.value && al.same_shape(bl) && ar.same_shape(br)
      }
      _ => false,
    }
  }
}

/// Drops a `^parent` suffix from a label
pub fn strip_annotation(label: &str) -> &str {
  label.split('^').next().unwrap_or(label)
}

impl<U: Clone> SynTree<String, U> {
  /// Copy of this tree with parent annotations removed from every label
  pub fn strip_annotations(&self) -> SynTree<String, U> {
    self.map(
      |c| strip_annotation(&c.value).to_string(),
      |w| w.value.clone(),
    )
  }
}

/// Bracket notation: `(S (NP dog) (VP barks))`
impl<T, U> fmt::Display for SynTree<T, U>
where
  T: fmt::Display,
  U: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(t, w) => write!(f, "({} {})", t.value, w.value),
      Self::Branch(t, l, r) => write!(f, "({} {} {})", t.value, l, r),
    }
  }
}

struct BracketReader<'a> {
  tokens: Vec<(usize, &'a str)>,
  pos: usize,
  words: usize,
}

impl<'a> BracketReader<'a> {
  fn new(s: &'a str) -> Self {
    regex_static!(BRACKET_TOKEN, r"[()]|[^\s()]+");
    Self {
      tokens: BRACKET_TOKEN
        .find_iter(s)
        .map(|m| (m.start(), m.as_str()))
        .collect(),
      pos: 0,
      words: 0,
    }
  }

  fn at_end(&self) -> bool {
    self.pos >= self.tokens.len()
  }

  fn peek(&self) -> Result<(usize, &'a str), TreeError> {
    self.tokens.get(self.pos).copied().ok_or(TreeError::UnexpectedEnd)
  }

  fn bump(&mut self) -> Result<(usize, &'a str), TreeError> {
    let tok = self.peek()?;
    self.pos += 1;
    Ok(tok)
  }

  fn expect(&mut self, want: &str) -> Result<(), TreeError> {
    let (offset, found) = self.bump()?;
    if found == want {
      Ok(())
    } else {
      Err(TreeError::Unexpected {
        found: found.to_string(),
        offset,
      })
    }
  }

  fn atom(&mut self) -> Result<&'a str, TreeError> {
    let (offset, found) = self.bump()?;
    if found == "(" || found == ")" {
      Err(TreeError::Unexpected {
        found: found.to_string(),
        offset,
      })
    } else {
      Ok(found)
    }
  }

  fn tree(&mut self) -> Result<SynTree<String, String>, TreeError> {
    self.expect("(")?;

    if self.peek()?.1 == "(" {
      // unlabeled wrapper, as treebanks write `( (S ...) )`
      let inner = self.tree()?;
      self.expect(")")?;
      return Ok(inner);
    }

    let label = self.atom()?.to_string();
    let start = self.words;

    let (_, next) = self.peek()?;
    if next != "(" && next != ")" {
      let word = self.atom()?.to_string();
      self.words += 1;
      self.expect(")")?;
      return Ok(SynTree::Leaf(
        Constituent {
          value: label,
          span: (start, start + 1),
        },
        Word {
          value: word,
          span: (start, start + 1),
        },
      ));
    }

    let mut children = Vec::new();
    while self.peek()?.1 == "(" {
      children.push(self.tree()?);
    }
    self.expect(")")?;

    match <[SynTree<String, String>; 2]>::try_from(children) {
      Ok([left, right]) => Ok(SynTree::Branch(
        Constituent {
          value: label,
          span: (start, self.words),
        },
        Box::new(left),
        Box::new(right),
      )),
      Err(children) => Err(TreeError::Arity {
        label,
        arity: children.len(),
      }),
    }
  }
}

impl FromStr for SynTree<String, String> {
  type Err = TreeError;

  /// Reads one tree in bracket notation. Only binary branches and
  /// `(label word)` leaves are accepted.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut reader = BracketReader::new(s);
    let tree = reader.tree()?;
    match reader.tokens.get(reader.pos) {
      Some((offset, _)) => Err(TreeError::Trailing(*offset)),
      None => Ok(tree),
    }
  }
}

/// Reads consecutive bracketed trees, e.g. a whole treebank file. Trees may
/// span several lines.
pub fn parse_trees(s: &str) -> Result<Vec<SynTree<String, String>>, TreeError> {
  let mut reader = BracketReader::new(s);
  let mut trees = Vec::new();
  while !reader.at_end() {
    // word offsets restart with every sentence
    reader.words = 0;
    trees.push(reader.tree()?);
  }
  Ok(trees)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display_brackets() {
    let t: SynTree<String, String> = "(S (NP dog) (VP barks))".parse().unwrap();
    assert_eq!(t.to_string(), "(S (NP dog) (VP barks))");
    assert_eq!(t.span(), (0, 2));
    assert_eq!(t.depth(), 2);
    assert_eq!(t.words(), vec!["dog", "barks"]);
  }

  #[test]
  fn test_read_normalizes_whitespace() {
    let t: SynTree<String, String> = "( (S\n  (NP dog)\n  (VP (V chases) (NP cats))) )"
      .parse()
      .unwrap();
    assert_eq!(t.to_string(), "(S (NP dog) (VP (V chases) (NP cats)))");

    let (np, vp) = t.get_children().unwrap();
    assert_eq!(np.span(), (0, 1));
    assert_eq!(vp.span(), (1, 3));
    assert_eq!(vp.get_children().unwrap().1.get_leaf().unwrap().span, (2, 3));
  }

  #[test]
  fn test_read_errors() {
    assert_eq!(
      "(S (NP dog) (VP barks) (PP x))".parse::<SynTree<String, String>>(),
      Err(TreeError::Arity {
        label: "S".to_string(),
        arity: 3
      })
    );
    assert_eq!(
      "(S (NP dog)".parse::<SynTree<String, String>>(),
      Err(TreeError::UnexpectedEnd)
    );
    assert_eq!(
      "(NP dog) x".parse::<SynTree<String, String>>(),
      Err(TreeError::Trailing(9))
    );
    assert!(matches!(
      "(NP dog cat)".parse::<SynTree<String, String>>(),
      Err(TreeError::Unexpected { .. })
    ));
  }

  #[test]
  fn test_parse_trees() {
    let trees = parse_trees("(S (NP dog) (VP barks))\n( (S (NP cat)\n  (VP meows)) )\n").unwrap();
    assert_eq!(trees.len(), 2);
    assert_eq!(trees[1].to_string(), "(S (NP cat) (VP meows))");
    assert_eq!(trees[1].span(), (0, 2));
    assert!(parse_trees("").unwrap().is_empty());
    assert_eq!(parse_trees("(S (NP dog)"), Err(TreeError::UnexpectedEnd));
  }

  #[test]
  fn test_strip_annotations() {
    let t: SynTree<String, String> = "(S^ (NP^S dog) (VP^S barks))".parse().unwrap();
    assert_eq!(t.strip_annotations().to_string(), "(S (NP dog) (VP barks))");
    assert!(!t.same_shape(&t.strip_annotations()));
    assert_eq!(strip_annotation("NP"), "NP");
  }

  #[test]
  fn test_round_trip_preserves_shape() {
    let src = "(S (NP (DT the) (NN dog)) (VP (VB saw) (NP (DT a) (NN cat))))";
    let t: SynTree<String, String> = src.parse().unwrap();
    let again: SynTree<String, String> = t.to_string().parse().unwrap();
    assert!(t.same_shape(&again));
    assert_eq!(t, again);
  }
}
