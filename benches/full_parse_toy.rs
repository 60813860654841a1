use criterion::{Criterion, black_box, criterion_group, criterion_main};

use pcky::Grammar;

const GRAMMAR_SRC: &str = include_str!("./toy.pcfg");

fn parse(g: &Grammar, input: &[&str]) -> bool {
  g.parse(input).unwrap().is_some()
}

fn criterion_benchmark(c: &mut Criterion) {
  let grammar = GRAMMAR_SRC.parse::<Grammar>().unwrap();
  let simple_input = "I saw the man".split(' ').collect::<Vec<_>>();
  let ambiguous_input = "she said I saw the man with a telescope in the park with a telescope"
    .split(' ')
    .collect::<Vec<_>>();

  c.bench_function("parse simple", |b| {
    b.iter(|| parse(black_box(&grammar), black_box(&simple_input)))
  });

  c.bench_function("parse ambiguous attachment", |b| {
    b.iter(|| parse(black_box(&grammar), black_box(&ambiguous_input)))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
