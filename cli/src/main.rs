use std::fs;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pcky::syntree::parse_trees;
use pcky::tokenize::tokenize;
use pcky::{EstimateOptions, Err, Grammar, Parse, ParseError, ParseOptions, estimate};

#[derive(Parser)]
#[command(name = "pcky", version, about = "Viterbi CKY parsing with CNF PCFGs")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Parse sentences, writing one bracketed tree per line (blank if unparsable).
  /// Without SENTENCES, reads sentences interactively from stdin.
  Parse {
    /// Grammar file (`LHS -> RHS [prob]` rules)
    grammar: PathBuf,

    /// One raw sentence per line
    sentences: Option<PathBuf>,

    /// Write trees here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the parse chart for every sentence
    #[arg(short, long)]
    chart: bool,

    /// Append the derivation probability after each tree
    #[arg(short, long)]
    prob: bool,

    /// Keep `^parent` suffixes on labels in the output
    #[arg(long)]
    keep_annotations: bool,

    /// Skip sentences with more tokens than this
    #[arg(long)]
    max_tokens: Option<usize>,
  },

  /// Estimate a PCFG from a treebank of binary bracketed trees
  Estimate {
    /// Bracketed trees, e.g. `(S (NP dog) (VP barks))`
    treebank: PathBuf,

    /// Write the grammar here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Annotate every label with its parent's label (`NP^S`)
    #[arg(long)]
    parent: bool,
  },
}

struct ParseArgs {
  chart: bool,
  prob: bool,
  keep_annotations: bool,
  opts: ParseOptions,
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, Err> {
  Ok(match path {
    Some(path) => Box::new(BufWriter::new(File::create(path)?)),
    None => Box::new(BufWriter::new(io::stdout())),
  })
}

fn format_parse(result: Result<Option<Parse>, ParseError>, args: &ParseArgs) -> Result<String, Err> {
  match result {
    Ok(Some(parse)) => {
      let tree = if args.keep_annotations {
        parse.tree.to_string()
      } else {
        parse.tree.strip_annotations().to_string()
      };
      if args.prob {
        Ok(format!("{}\t{:e}", tree, parse.prob))
      } else {
        Ok(tree)
      }
    }
    Ok(None) => Ok(String::new()),
    Err(err @ ParseError::TooLong { .. }) => {
      warn!("skipping sentence: {}", err);
      Ok(String::new())
    }
    Err(err) => {
      error!("{}", err);
      Err(err.into())
    }
  }
}

fn parse_file(g: &Grammar, sentences: &Path, out: &mut dyn Write, args: &ParseArgs) -> Result<(), Err> {
  let text = fs::read_to_string(sentences)?;
  let tokenized = text.lines().map(tokenize).collect::<Vec<_>>();
  info!(sentences = tokenized.len(), "parsing");

  if args.chart {
    for (idx, tokens) in tokenized.iter().enumerate() {
      if args.opts.allows(tokens.len()) {
        eprintln!("chart {}:\n{}", idx, g.parse_chart(tokens));
      }
    }
  }

  let results = g.parse_batch(&tokenized, &args.opts);
  let mut parsed = 0;
  for result in results {
    if matches!(result, Ok(Some(_))) {
      parsed += 1;
    }
    writeln!(out, "{}", format_parse(result, args)?)?;
  }
  out.flush()?;

  info!(parsed, total = tokenized.len(), "done");
  Ok(())
}

fn parse_interactive(g: &Grammar, out: &mut dyn Write, args: &ParseArgs) -> Result<(), Err> {
  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    input.clear();
    if io::stdin().read_line(&mut input)? == 0 {
      // ctrl+d
      return Ok(());
    }

    let tokens = tokenize(&input);
    if args.chart && args.opts.allows(tokens.len()) {
      println!("chart:\n{}", g.parse_chart(&tokens));
    }

    let line = format_parse(g.parse_with(&tokens, &args.opts), args)?;
    if line.is_empty() {
      writeln!(out, "(no parse)")?;
    } else {
      writeln!(out, "{}", line)?;
    }
    out.flush()?;
  }
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  match Cli::parse().command {
    Command::Parse {
      grammar,
      sentences,
      output,
      chart,
      prob,
      keep_annotations,
      max_tokens,
    } => {
      let g = Grammar::read_from_file(&grammar)?;
      info!(rules = g.rules().len(), start = g.start(), "loaded grammar");

      let args = ParseArgs {
        chart,
        prob,
        keep_annotations,
        opts: ParseOptions { max_tokens },
      };
      let mut out = open_output(output.as_deref())?;
      match sentences {
        Some(path) => parse_file(&g, &path, &mut out, &args),
        None => parse_interactive(&g, &mut out, &args),
      }
    }

    Command::Estimate {
      treebank,
      output,
      parent,
    } => {
      let trees = parse_trees(&fs::read_to_string(&treebank)?)?;
      let g = estimate(
        &trees,
        EstimateOptions {
          parent_annotation: parent,
        },
      )?;
      info!(trees = trees.len(), rules = g.rules().len(), "estimated grammar");

      let mut out = open_output(output.as_deref())?;
      write!(out, "{}", g)?;
      out.flush()?;
      Ok(())
    }
  }
}
