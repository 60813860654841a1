use std::collections::HashMap;
use std::fmt;

/// Names one entry of one cell: the entry at `index` in cell (`start`, `end`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanRef {
  pub start: usize,
  pub end: usize,
  pub index: usize,
}

impl SpanRef {
  pub fn new(start: usize, end: usize, index: usize) -> Self {
    Self { start, end, index }
  }
}

impl fmt::Display for SpanRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}#{}", self.start, self.end, self.index)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpointer {
  /// Derived by a lexical rule from the single word under the cell
  Lexical,
  /// Derived by a binary rule from two adjacent sub-spans
  Binary(SpanRef, SpanRef),
}

/// Best known derivation of `label` over a cell's span. Labels borrow from the
/// grammar, which outlives the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<'g> {
  pub label: &'g str,
  pub prob: f64,
  pub backpointer: Backpointer,
}

impl fmt::Display for Entry<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {:.5}", self.label, self.prob)?;
    if let Backpointer::Binary(l, r) = self.backpointer {
      write!(f, " <- {} {}", l, r)?;
    }
    Ok(())
  }
}

/// Entries for one span, in the order their labels were first derived.
/// Each label appears at most once.
#[derive(Debug, Clone, Default)]
pub struct Cell<'g> {
  entries: Vec<Entry<'g>>,
  by_label: HashMap<&'g str, usize>,
}

impl<'g> Cell<'g> {
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn entries(&self) -> &[Entry<'g>] {
    &self.entries
  }

  pub fn get(&self, index: usize) -> Option<&Entry<'g>> {
    self.entries.get(index)
  }

  /// Index and entry for `label`, if it was derived over this span
  pub fn find(&self, label: &str) -> Option<(usize, &Entry<'g>)> {
    let idx = *self.by_label.get(label)?;
    Some((idx, &self.entries[idx]))
  }

  /// Records a derivation of `label`. A label already present keeps its slot
  /// and is only overwritten by a strictly more probable derivation, so the
  /// first of several equally good derivations wins.
  /// Returns true if the cell changed.
  pub fn add(&mut self, label: &'g str, prob: f64, backpointer: Backpointer) -> bool {
    match self.by_label.get(label) {
      Some(&idx) => {
        let entry = &mut self.entries[idx];
        if prob > entry.prob {
          entry.prob = prob;
          entry.backpointer = backpointer;
          true
        } else {
          false
        }
      }
      None => {
        self.by_label.insert(label, self.entries.len());
        self.entries.push(Entry {
          label,
          prob,
          backpointer,
        });
        true
      }
    }
  }
}

/// Triangular CKY table over a sentence of `len` words. Cell (i, j) covers
/// words i..j, for 0 <= i < j <= len; cells are stored row-major in one Vec.
#[derive(Debug)]
pub struct Chart<'g> {
  len: usize,
  cells: Vec<Cell<'g>>,
}

impl<'g> Chart<'g> {
  pub fn new(len: usize) -> Self {
    Self {
      len,
      cells: vec![Cell::default(); len * (len + 1) / 2],
    }
  }

  /// Number of words the chart spans
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  fn offset(&self, start: usize, end: usize) -> Option<usize> {
    if start < end && end <= self.len {
      // rows before `start` hold len, len - 1, ... cells
      Some(start * self.len - start * start.saturating_sub(1) / 2 + (end - start - 1))
    } else {
      None
    }
  }

  pub fn cell(&self, start: usize, end: usize) -> Option<&Cell<'g>> {
    self.offset(start, end).map(|o| &self.cells[o])
  }

  pub(crate) fn cell_mut(&mut self, start: usize, end: usize) -> Option<&mut Cell<'g>> {
    self.offset(start, end).map(move |o| &mut self.cells[o])
  }

  /// The cell spanning the whole sentence
  pub fn top(&self) -> Option<&Cell<'g>> {
    self.cell(0, self.len)
  }

  pub fn entry(&self, at: SpanRef) -> Option<&Entry<'g>> {
    self.cell(at.start, at.end)?.get(at.index)
  }

  /// Total entries across all cells
  pub fn entry_count(&self) -> usize {
    self.cells.iter().map(Cell::len).sum()
  }

  /// Iterates cells as ((start, end), cell), shortest spans first
  pub fn iter_by_length(&self) -> impl Iterator<Item = ((usize, usize), &Cell<'g>)> + '_ {
    (1..=self.len).flat_map(move |width| {
      (0..=self.len - width).filter_map(move |start| {
        let end = start + width;
        self.cell(start, end).map(|cell| ((start, end), cell))
      })
    })
  }
}

impl fmt::Display for Chart<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for ((start, end), cell) in self.iter_by_length() {
      if cell.is_empty() {
        continue;
      }
      writeln!(f, "Cell {}..{}:", start, end)?;
      for (idx, entry) in cell.entries().iter().enumerate() {
        writeln!(f, "  #{} {}", idx, entry)?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_offsets_cover_triangle_exactly_once() {
    for len in 0..8 {
      let chart = Chart::new(len);
      let mut seen = vec![false; len * (len + 1) / 2];
      for start in 0..len {
        for end in start + 1..=len {
          let o = chart.offset(start, end).unwrap();
          assert!(!seen[o], "offset {} reused at {}..{}", o, start, end);
          seen[o] = true;
        }
      }
      assert!(seen.into_iter().all(|s| s));
      assert_eq!(chart.iter_by_length().count(), len * (len + 1) / 2);
    }
  }

  #[test]
  fn test_out_of_bounds_cells() {
    let chart = Chart::new(3);
    assert!(chart.cell(0, 3).is_some());
    assert!(chart.cell(1, 1).is_none());
    assert!(chart.cell(2, 1).is_none());
    assert!(chart.cell(0, 4).is_none());
    assert!(chart.entry(SpanRef::new(0, 1, 0)).is_none());
    assert!(Chart::new(0).top().is_none());
  }

  #[test]
  fn test_cell_keeps_first_best() {
    let mut cell = Cell::default();
    let bp = |i| Backpointer::Binary(SpanRef::new(0, 1, i), SpanRef::new(1, 2, 0));

    assert!(cell.add("NP", 0.2, bp(0)));
    assert!(cell.add("VP", 0.1, bp(1)));
    assert!(!cell.add("NP", 0.2, bp(2)));
    assert!(!cell.add("NP", 0.1, bp(3)));
    assert_eq!(cell.find("NP").unwrap(), (0, &Entry { label: "NP", prob: 0.2, backpointer: bp(0) }));

    assert!(cell.add("NP", 0.3, bp(4)));
    assert_eq!(cell.len(), 2);
    assert_eq!(cell.find("NP").unwrap().1.backpointer, bp(4));
    assert_eq!(cell.get(1).unwrap().label, "VP");
    assert!(cell.find("S").is_none());
  }
}
