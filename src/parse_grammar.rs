//! Line-oriented recursive-descent parsing of weighted grammar files
//!
//! ```text
//! %start S
//! S -> NP VP [1.0]
//! NP -> 'dog' [0.5] | "it's" [0.5]   # comment
//! ```
use regex::Regex;

use crate::error::GrammarError;
use crate::rules::{Production, Rule, Symbol};

type Infallible<'a, T> = (T, &'a str);
type ParseResult<'a, T> = Result<(T, &'a str), String>;

/// Try to consume a regex, returning None if it doesn't match
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  match re.find(s) {
    Some(m) if m.start() == 0 => {
      let (_, rest) = s.split_at(m.end());
      (Some(m.as_str()), rest)
    }
    _ => (None, s),
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &'static Regex, s: &'a str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {:?}", re, s))
  }
}

/// Try to consume a char, returning None if it doesn't match
fn optional_char(c: char, s: &str) -> Infallible<'_, Option<char>> {
  match s.strip_prefix(c) {
    Some(rest) => (Some(c), rest),
    None => (None, s),
  }
}

/// Try to consume a char, failing if it doesn't match
fn needed_char(c: char, s: &str) -> ParseResult<'_, char> {
  if let (Some(c), rest) = optional_char(c, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {:?} at {:?}", c, s))
  }
}

/// Skips spaces and tabs. Lines are split before we get here.
fn skip_whitespace(s: &str) -> &str {
  s.trim_start_matches([' ', '\t', '\r'])
}

fn is_line_end(s: &str) -> bool {
  s.is_empty() || s.starts_with('#')
}

/// Nonterminal names: any run of characters that isn't whitespace, a quote,
/// a bracket or `|`. Treebank labels like `.`, `-NONE-` and parent-annotated
/// `NP^S` all read as one opaque name. A leading `#` or `%` would start a
/// comment or a directive instead.
fn parse_name(s: &str) -> ParseResult<'_, &str> {
  regex_static!(NAME, r#"[^\s'"\[\]|#%][^\s'"\[\]|]*"#);
  needed_re(&*NAME, s).map_err(|err| format!("name: {}", err))
}

/// True if `name` reads back as a single nonterminal
pub(crate) fn is_name(name: &str) -> bool {
  matches!(parse_name(name), Ok((_, "")))
}

/// True if `word` can be written as a quoted terminal and read back
pub(crate) fn is_terminal(word: &str) -> bool {
  !(word.contains('\'') && word.contains('"')) && !word.contains(['\n', '\r'])
}

fn parse_terminal(s: &str) -> Infallible<'_, Option<&str>> {
  regex_static!(QUOTED, r#"'[^']*'|"[^"]*""#);
  match optional_re(&*QUOTED, s) {
    (Some(quoted), rest) => (Some(&quoted[1..quoted.len() - 1]), rest),
    (None, rest) => (None, rest),
  }
}

fn parse_production(s: &str) -> ParseResult<'_, Production> {
  if let (Some(word), s) = parse_terminal(s) {
    return Ok((Production::Terminal(word.to_string()), s));
  }
  let (name, s) = parse_name(s)?;
  Ok((Production::Nonterminal(Symbol::new(name.to_string())), s))
}

/// `[0.25]`; the range is checked later, when the rule is indexed
fn parse_probability(s: &str) -> ParseResult<'_, f64> {
  regex_static!(NUMBER, r"[-+]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][-+]?[0-9]+)?");

  let (_, s) = needed_char('[', s)?;
  let s = skip_whitespace(s);
  let (number, s) = needed_re(&*NUMBER, s).map_err(|e| format!("probability: {}", e))?;
  let prob = number
    .parse::<f64>()
    .map_err(|e| format!("probability {:?}: {}", number, e))?;
  let s = skip_whitespace(s);
  let (_, s) = needed_char(']', s)?;
  Ok((prob, s))
}

/// Productions up to and including the bracketed probability
fn parse_alternative<'a>(lhs: &str, s: &'a str) -> ParseResult<'a, Rule> {
  let mut productions = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if rem.starts_with('[') {
      break;
    }
    if is_line_end(rem) || rem.starts_with('|') {
      return Err(format!("rule for {} is missing a probability like [0.5]", lhs));
    }
    let (prod, s) = parse_production(rem).map_err(|e| format!("rule production: {}", e))?;
    productions.push(prod);
    rem = s;
  }

  let (prob, rem) = parse_probability(rem)?;
  Ok((
    Rule {
      symbol: Symbol::new(lhs.to_string()),
      productions,
      prob,
    },
    rem,
  ))
}

/// `LHS -> alt | alt ...`
fn parse_rule_line(s: &str) -> ParseResult<'_, Vec<Rule>> {
  #![allow(clippy::trivial_regex)]
  regex_static!(ARROW, "->");

  let (lhs, s) = parse_name(s).map_err(|e| format!("rule symbol: {}", e))?;
  let s = skip_whitespace(s);
  let (_, s) = needed_re(&*ARROW, s).map_err(|e| format!("rule arrow: {}", e))?;

  let mut rules = Vec::new();
  let mut rem = s;
  loop {
    let (rule, s) = parse_alternative(lhs, rem)?;
    rules.push(rule);
    match optional_char('|', skip_whitespace(s)) {
      (Some(_), s) => rem = s,
      (None, s) => return Ok((rules, s)),
    }
  }
}

fn parse_start(s: &str) -> ParseResult<'_, Option<&str>> {
  regex_static!(START, r"%start\b");
  match optional_re(&*START, s) {
    (Some(_), s) => {
      let (name, s) = parse_name(skip_whitespace(s)).map_err(|e| format!("%start: {}", e))?;
      Ok((Some(name), s))
    }
    (None, s) => Ok((None, s)),
  }
}

/// Parses grammar text into an optional `%start` symbol and the rules in file
/// order. Rules aren't checked for CNF here.
pub fn parse(s: &str) -> Result<(Option<String>, Vec<Rule>), GrammarError> {
  let mut start: Option<String> = None;
  let mut rules = Vec::new();

  for (idx, line) in s.lines().enumerate() {
    let syntax = |msg: String| GrammarError::Syntax { line: idx + 1, msg };

    let rem = skip_whitespace(line);
    if is_line_end(rem) {
      continue;
    }

    let rem = match parse_start(rem).map_err(syntax)? {
      (Some(name), rem) => {
        if let Some(prev) = &start {
          return Err(syntax(format!("%start given twice ({} and {})", prev, name)));
        }
        start = Some(name.to_string());
        rem
      }
      (None, rem) => {
        let (line_rules, rem) = parse_rule_line(rem).map_err(syntax)?;
        rules.extend(line_rules);
        rem
      }
    };

    let rem = skip_whitespace(rem);
    if !is_line_end(rem) {
      return Err(syntax(format!("unexpected trailing input {:?}", rem)));
    }
  }

  if rules.is_empty() {
    return Err(GrammarError::Empty);
  }
  Ok((start, rules))
}
