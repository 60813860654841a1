use tracing::{debug, debug_span, trace};

use crate::chart::{Backpointer, Cell, Chart, Entry, SpanRef};
use crate::error::ParseError;
use crate::grammar::Grammar;
use crate::syntree::{Constituent, SynTree, Word};

/// The most probable derivation of a sentence
#[derive(Debug, Clone, PartialEq)]
pub struct Parse {
  pub tree: SynTree<String, String>,
  pub prob: f64,
}

/// Fills a CKY chart for `input`, shortest spans first. Every cell only reads
/// cells strictly shorter than itself, so each is final once written.
///
/// Within a cell, candidates are tried by split point (left to right), then
/// left entry (cell order), then binary rule (grammar order). Of equally
/// probable derivations of a label the first one tried is kept.
pub fn parse_chart<'g, S: AsRef<str>>(g: &'g Grammar, input: &[S]) -> Chart<'g> {
  let _span = debug_span!("parse_chart", words = input.len()).entered();
  let mut chart = Chart::new(input.len());

  for (k, word) in input.iter().enumerate() {
    scanner(g, &mut chart, k, word.as_ref());
  }

  for width in 2..=input.len() {
    for start in 0..=input.len() - width {
      combiner(g, &mut chart, start, start + width);
    }
  }

  debug!(entries = chart.entry_count(), "filled chart");
  chart
}

fn scanner<'g>(g: &'g Grammar, chart: &mut Chart<'g>, k: usize, word: &str) {
  let Some(cell) = chart.cell_mut(k, k + 1) else {
    return;
  };

  for rule in g.lexical(word) {
    cell.add(&rule.lhs, rule.prob, Backpointer::Lexical);
  }

  if cell.is_empty() {
    trace!(word, position = k, "no lexical rule covers word");
  }
}

fn combiner<'g>(g: &'g Grammar, chart: &mut Chart<'g>, start: usize, end: usize) {
  let mut cell = Cell::default();

  for split in start + 1..end {
    let (Some(left), Some(right)) = (chart.cell(start, split), chart.cell(split, end)) else {
      continue;
    };
    if left.is_empty() || right.is_empty() {
      continue;
    }

    for (left_idx, a) in left.entries().iter().enumerate() {
      for rule in g.binary_by_left(a.label) {
        // right side is matched in rule order only: B -> A C never matches C A
        if let Some((right_idx, c)) = right.find(&rule.right) {
          cell.add(
            &rule.lhs,
            rule.prob * a.prob * c.prob,
            Backpointer::Binary(
              SpanRef::new(start, split, left_idx),
              SpanRef::new(split, end, right_idx),
            ),
          );
        }
      }
    }
  }

  if let Some(slot) = chart.cell_mut(start, end) {
    *slot = cell;
  }
}

fn inconsistent(msg: String) -> ParseError {
  ParseError::InternalConsistency(msg)
}

/// Picks the most probable start-symbol entry of the top cell and rebuilds its
/// tree. `Ok(None)` means the grammar doesn't derive the sentence.
pub fn best_parse<S: AsRef<str>>(
  chart: &Chart<'_>,
  g: &Grammar,
  input: &[S],
) -> Result<Option<Parse>, ParseError> {
  if chart.len() != input.len() {
    return Err(inconsistent(format!(
      "chart spans {} words, sentence has {}",
      chart.len(),
      input.len()
    )));
  }

  let Some(top) = chart.top() else {
    return Ok(None);
  };

  // max probability, earliest entry on ties
  let mut best: Option<(usize, &Entry)> = None;
  for (idx, e) in top.entries().iter().enumerate() {
    if e.label == g.start() && best.is_none_or(|(_, b)| e.prob > b.prob) {
      best = Some((idx, e));
    }
  }

  let Some((idx, entry)) = best else {
    trace!(start = g.start(), "start symbol missing from top cell");
    return Ok(None);
  };

  let tree = build_tree(chart, input, SpanRef::new(0, input.len(), idx))?;
  Ok(Some(Parse {
    tree,
    prob: entry.prob,
  }))
}

fn build_tree<S: AsRef<str>>(
  chart: &Chart<'_>,
  input: &[S],
  at: SpanRef,
) -> Result<SynTree<String, String>, ParseError> {
  let entry = chart
    .entry(at)
    .ok_or_else(|| inconsistent(format!("backpointer to missing entry {}", at)))?;

  let cons = Constituent {
    value: entry.label.to_string(),
    span: (at.start, at.end),
  };

  match entry.backpointer {
    Backpointer::Lexical => {
      if at.end != at.start + 1 {
        return Err(inconsistent(format!("lexical entry {} covers more than one word", at)));
      }
      let word = input
        .get(at.start)
        .ok_or_else(|| inconsistent(format!("no word under {}", at)))?;
      Ok(SynTree::Leaf(
        cons,
        Word {
          value: word.as_ref().to_string(),
          span: (at.start, at.end),
        },
      ))
    }
    Backpointer::Binary(left, right) => {
      let splits_parent = left.start == at.start
        && left.end == right.start
        && right.end == at.end
        && left.start < left.end
        && right.start < right.end;
      if !splits_parent {
        return Err(inconsistent(format!(
          "backpointers {} {} don't split {}..{}",
          left, right, at.start, at.end
        )));
      }
      Ok(SynTree::Branch(
        cons,
        Box::new(build_tree(chart, input, left)?),
        Box::new(build_tree(chart, input, right)?),
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn grammar(src: &str) -> Grammar {
    src.parse().unwrap()
  }

  #[test]
  fn test_lexical_cells() {
    let g = grammar(
      "S -> NP VP [1.0]\n\
       NP -> 'dog' [0.7]\n\
       NN -> 'dog' [0.3]\n\
       VP -> 'barks' [1.0]",
    );
    let chart = parse_chart(&g, &["dog", "barks", "meows"]);

    let dog = chart.cell(0, 1).unwrap();
    assert_eq!(dog.len(), 2);
    assert_eq!(dog.get(0).unwrap().label, "NP");
    assert_eq!(dog.get(1).unwrap().label, "NN");
    assert_eq!(dog.get(0).unwrap().backpointer, Backpointer::Lexical);

    assert!(chart.cell(2, 3).unwrap().is_empty());
    // the empty cell blocks everything above it
    assert!(chart.cell(1, 3).unwrap().is_empty());
    assert!(chart.top().unwrap().is_empty());
    assert_eq!(chart.cell(0, 2).unwrap().find("S").unwrap().1.prob, 0.7);
  }

  #[test]
  fn test_rhs_order_matters() {
    let g = grammar("S -> A C [1.0]\nA -> 'a' [1.0]\nC -> 'c' [1.0]");
    assert!(parse_chart(&g, &["a", "c"]).top().unwrap().find("S").is_some());
    assert!(parse_chart(&g, &["c", "a"]).top().unwrap().find("S").is_none());
  }

  #[test]
  fn test_every_split_point_is_tried() {
    // S over "a a a" is reachable through both 1+2 and 2+1 splits; the
    // second split is more probable and must win
    let g = grammar(
      "S -> A X [0.5] | X A [1.0]\n\
       X -> A A [1.0]\n\
       A -> 'a' [0.5]",
    );
    let chart = parse_chart(&g, &["a", "a", "a"]);
    let (_, s) = chart.top().unwrap().find("S").unwrap();
    assert_eq!(s.prob, 1.0 * (1.0 * 0.5 * 0.5) * 0.5);
    assert_eq!(
      s.backpointer,
      Backpointer::Binary(SpanRef::new(0, 2, 0), SpanRef::new(2, 3, 0))
    );
  }

  #[test]
  fn test_backpointers_reference_sub_spans() {
    let g = grammar(
      "S -> NP VP [1.0]\n\
       VP -> V NP [1.0]\n\
       NP -> 'they' [0.5] | 'fish' [0.5]\n\
       V -> 'fish' [1.0]",
    );
    let chart = parse_chart(&g, &["they", "fish", "fish"]);
    for ((start, end), cell) in chart.iter_by_length() {
      for entry in cell.entries() {
        match entry.backpointer {
          Backpointer::Lexical => assert_eq!(end, start + 1),
          Backpointer::Binary(l, r) => {
            assert_eq!((l.start, r.end), (start, end));
            assert_eq!(l.end, r.start);
            assert!(chart.entry(l).is_some() && chart.entry(r).is_some());
          }
        }
      }
    }
  }

  #[test]
  fn test_best_parse_picks_max_start_entry() {
    let g = grammar("S -> 'a' [0.25]\nS -> 'a' [0.5]\nT -> 'a' [1.0]");
    let parse = best_parse(&parse_chart(&g, &["a"]), &g, &["a"]).unwrap().unwrap();
    assert_eq!(parse.prob, 0.5);
    assert_eq!(parse.tree.to_string(), "(S a)");
  }

  #[test]
  fn test_length_mismatch_is_inconsistent() {
    let g = grammar("S -> 'a' [1.0]");
    let chart = parse_chart(&g, &["a"]);
    assert!(matches!(
      best_parse(&chart, &g, &["a", "a"]),
      Err(ParseError::InternalConsistency(_))
    ));
  }

  #[test]
  fn test_corrupt_backpointers_are_inconsistent() {
    let g = grammar("S -> A A [1.0]\nA -> 'a' [1.0]");
    let input = ["a", "a"];

    let corrupt = |bp: Backpointer| {
      let mut chart = parse_chart(&g, &input);
      let top = chart.cell_mut(0, 2).unwrap();
      *top = Cell::default();
      top.add("S", 1.0, bp);
      best_parse(&chart, &g, &input)
    };

    // entry index out of range
    assert!(matches!(
      corrupt(Backpointer::Binary(SpanRef::new(0, 1, 0), SpanRef::new(1, 2, 7))),
      Err(ParseError::InternalConsistency(_))
    ));
    // cell outside the chart
    assert!(matches!(
      corrupt(Backpointer::Binary(SpanRef::new(0, 1, 0), SpanRef::new(1, 3, 0))),
      Err(ParseError::InternalConsistency(_))
    ));
    // sub-spans that don't tile the parent
    assert!(matches!(
      corrupt(Backpointer::Binary(SpanRef::new(0, 1, 0), SpanRef::new(0, 1, 0))),
      Err(ParseError::InternalConsistency(_))
    ));
    // a lexical entry over two words
    assert!(matches!(
      corrupt(Backpointer::Lexical),
      Err(ParseError::InternalConsistency(_))
    ));
    // sanity: the honest backpointer still works
    assert!(
      corrupt(Backpointer::Binary(SpanRef::new(0, 1, 0), SpanRef::new(1, 2, 0)))
        .unwrap()
        .is_some()
    );
  }
}
