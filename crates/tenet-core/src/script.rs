//! Restricted evaluator for scripted acceptance predicates.
//!
//! A validation script is data, not code: it declares exactly one named
//! function of one parameter and returns a boolean expression over that
//! parameter. The evaluator locates the `function <name>(<param>)` header,
//! binds the declared parameter to the content string, and interprets the
//! body's `return` expression with a small, side-effect-free expression
//! language:
//!
//! - string / number / boolean literals
//! - the bound parameter, `.length`, `.trim()`, `.toLowerCase()`,
//!   `.toUpperCase()`, `.includes(s)`, `.contains(s)`, `.startsWith(s)`,
//!   `.endsWith(s)`
//! - comparison (`< <= > >=`) and equality (`== === != !==`) operators
//! - `&&`, `||`, `!`, and parentheses
//!
//! Statements before the `return` are not executed; a reference to
//! anything but the parameter is an evaluation failure, reported
//! per-criterion by the caller. Evaluation is fuel-limited so a
//! pathological expression cannot run unbounded.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Maximum number of expression nodes visited per invocation.
const FUEL: u32 = 10_000;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
  #[error("no function declaration found")]
  NoFunction,

  #[error("function body has no return expression")]
  NoReturn,

  #[error("parse error: {0}")]
  Parse(String),

  #[error("unknown identifier: {0:?}")]
  UnknownIdentifier(String),

  #[error("unknown method: {0:?}")]
  UnknownMethod(String),

  #[error("type error: {0}")]
  Type(String),

  #[error("evaluation budget exhausted")]
  FuelExhausted,
}

type ScriptResult<T> = Result<T, ScriptError>;

// ─── Predicate ───────────────────────────────────────────────────────────────

/// A parsed predicate: the declared function name plus the compiled
/// return expression. Invocations share no state.
#[derive(Debug, Clone)]
pub struct ScriptPredicate {
  name: String,
  body: Expr,
}

fn header_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"function\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*\(\s*([A-Za-z_$][A-Za-z0-9_$]*)?\s*\)")
      .expect("static regex")
  })
}

impl ScriptPredicate {
  /// Parse a script. Fails if no `function <identifier>` header can be
  /// located, the body has no `return`, or the return expression is not
  /// in the supported language.
  pub fn parse(script: &str) -> ScriptResult<Self> {
    let captures = header_regex()
      .captures(script)
      .ok_or(ScriptError::NoFunction)?;

    let name = captures[1].to_owned();
    let param = captures
      .get(2)
      .map_or("content", |m| m.as_str())
      .to_owned();

    let header_end = captures.get(0).map_or(0, |m| m.end());
    let body = function_body(&script[header_end..])
      .ok_or_else(|| ScriptError::Parse("unbalanced function body".into()))?;
    let return_src = return_expression(body).ok_or(ScriptError::NoReturn)?;

    let tokens = tokenize(return_src)?;
    let body = Parser::new(tokens, &param).parse()?;

    Ok(Self { name, body })
  }

  /// The declared function name.
  pub fn name(&self) -> &str { &self.name }

  /// Evaluate against `content`; the result is the expression value's
  /// truthiness (non-empty string, non-zero number, `true`).
  pub fn invoke(&self, content: &str) -> ScriptResult<bool> {
    let mut fuel = FUEL;
    Ok(eval(&self.body, content, &mut fuel)?.truthy())
  }
}

// ─── Script text helpers ─────────────────────────────────────────────────────

/// Slice out the brace-delimited body following the function header,
/// tracking nesting and skipping string literals.
fn function_body(rest: &str) -> Option<&str> {
  let open = rest.find('{')?;
  let bytes = rest.as_bytes();
  let mut depth = 0usize;
  let mut in_string: Option<u8> = None;
  let mut escaped = false;

  for (i, &b) in bytes.iter().enumerate().skip(open) {
    if let Some(quote) = in_string {
      if escaped {
        escaped = false;
      } else if b == b'\\' {
        escaped = true;
      } else if b == quote {
        in_string = None;
      }
      continue;
    }
    match b {
      b'\'' | b'"' => in_string = Some(b),
      b'{' => depth += 1,
      b'}' => {
        depth -= 1;
        if depth == 0 {
          return Some(&rest[open + 1..i]);
        }
      }
      _ => {}
    }
  }
  None
}

/// Find the first `return` keyword at word boundaries and slice its
/// expression up to the terminating `;` (or the end of the body).
fn return_expression(body: &str) -> Option<&str> {
  let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'$';
  let bytes = body.as_bytes();

  let mut search = 0;
  while let Some(offset) = body[search..].find("return") {
    let start = search + offset;
    let end = start + "return".len();
    let bounded = (start == 0 || !is_ident(bytes[start - 1]))
      && (end == body.len() || !is_ident(bytes[end]));
    if bounded {
      let expr = &body[end..];
      let expr = match expr_terminator(expr) {
        Some(i) => &expr[..i],
        None => expr,
      };
      return Some(expr);
    }
    search = end;
  }
  None
}

/// Position of the first `;` outside a string literal.
fn expr_terminator(expr: &str) -> Option<usize> {
  let mut in_string: Option<u8> = None;
  let mut escaped = false;
  for (i, &b) in expr.as_bytes().iter().enumerate() {
    if let Some(quote) = in_string {
      if escaped {
        escaped = false;
      } else if b == b'\\' {
        escaped = true;
      } else if b == quote {
        in_string = None;
      }
      continue;
    }
    match b {
      b'\'' | b'"' => in_string = Some(b),
      b';' => return Some(i),
      _ => {}
    }
  }
  None
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Ident(String),
  Num(f64),
  Str(String),
  LParen,
  RParen,
  Dot,
  Comma,
  Not,
  AndAnd,
  OrOr,
  Lt,
  Le,
  Gt,
  Ge,
  Eq,
  Ne,
}

fn tokenize(src: &str) -> ScriptResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let mut chars = src.char_indices().peekable();

  while let Some(&(i, c)) = chars.peek() {
    match c {
      c if c.is_whitespace() => {
        chars.next();
      }
      '(' => {
        chars.next();
        tokens.push(Token::LParen);
      }
      ')' => {
        chars.next();
        tokens.push(Token::RParen);
      }
      '.' => {
        chars.next();
        tokens.push(Token::Dot);
      }
      ',' => {
        chars.next();
        tokens.push(Token::Comma);
      }
      '&' => {
        chars.next();
        match chars.next_if(|&(_, c)| c == '&') {
          Some(_) => tokens.push(Token::AndAnd),
          None => return Err(ScriptError::Parse("expected `&&`".into())),
        }
      }
      '|' => {
        chars.next();
        match chars.next_if(|&(_, c)| c == '|') {
          Some(_) => tokens.push(Token::OrOr),
          None => return Err(ScriptError::Parse("expected `||`".into())),
        }
      }
      '<' => {
        chars.next();
        if chars.next_if(|&(_, c)| c == '=').is_some() {
          tokens.push(Token::Le);
        } else {
          tokens.push(Token::Lt);
        }
      }
      '>' => {
        chars.next();
        if chars.next_if(|&(_, c)| c == '=').is_some() {
          tokens.push(Token::Ge);
        } else {
          tokens.push(Token::Gt);
        }
      }
      '=' => {
        chars.next();
        if chars.next_if(|&(_, c)| c == '=').is_none() {
          return Err(ScriptError::Parse("assignment is not supported".into()));
        }
        // Accept both `==` and `===`.
        chars.next_if(|&(_, c)| c == '=');
        tokens.push(Token::Eq);
      }
      '!' => {
        chars.next();
        if chars.next_if(|&(_, c)| c == '=').is_some() {
          chars.next_if(|&(_, c)| c == '=');
          tokens.push(Token::Ne);
        } else {
          tokens.push(Token::Not);
        }
      }
      '\'' | '"' => {
        chars.next();
        tokens.push(Token::Str(read_string(&mut chars, c)?));
      }
      c if c.is_ascii_digit() => {
        let mut end = i;
        while let Some(&(j, c)) = chars.peek() {
          if c.is_ascii_digit() || c == '.' {
            end = j + c.len_utf8();
            chars.next();
          } else {
            break;
          }
        }
        let text = &src[i..end];
        let value = text
          .parse()
          .map_err(|_| ScriptError::Parse(format!("bad number {text:?}")))?;
        tokens.push(Token::Num(value));
      }
      c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
        let mut end = i;
        while let Some(&(j, c)) = chars.peek() {
          if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
            end = j + c.len_utf8();
            chars.next();
          } else {
            break;
          }
        }
        tokens.push(Token::Ident(src[i..end].to_owned()));
      }
      other => {
        return Err(ScriptError::Parse(format!("unexpected character {other:?}")));
      }
    }
  }

  Ok(tokens)
}

fn read_string(
  chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
  quote: char,
) -> ScriptResult<String> {
  let mut out = String::new();
  while let Some((_, c)) = chars.next() {
    match c {
      c if c == quote => return Ok(out),
      '\\' => match chars.next() {
        Some((_, 'n')) => out.push('\n'),
        Some((_, 't')) => out.push('\t'),
        Some((_, escaped)) => out.push(escaped),
        None => break,
      },
      c => out.push(c),
    }
  }
  Err(ScriptError::Parse("unterminated string literal".into()))
}

// ─── AST ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
  Lt,
  Le,
  Gt,
  Ge,
  Eq,
  Ne,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Method {
  Includes,
  StartsWith,
  EndsWith,
  Trim,
  ToLowerCase,
  ToUpperCase,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
  Str(String),
  Num(f64),
  Bool(bool),
  /// The bound function parameter (the content string).
  Param,
  Not(Box<Expr>),
  And(Box<Expr>, Box<Expr>),
  Or(Box<Expr>, Box<Expr>),
  Cmp(CmpOp, Box<Expr>, Box<Expr>),
  Length(Box<Expr>),
  Method(Method, Box<Expr>, Vec<Expr>),
}

// ─── Parser ──────────────────────────────────────────────────────────────────

struct Parser<'a> {
  tokens: Vec<Token>,
  pos:    usize,
  param:  &'a str,
}

impl<'a> Parser<'a> {
  fn new(tokens: Vec<Token>, param: &'a str) -> Self {
    Self { tokens, pos: 0, param }
  }

  fn parse(mut self) -> ScriptResult<Expr> {
    let expr = self.or_expr()?;
    match self.peek() {
      None => Ok(expr),
      Some(t) => Err(ScriptError::Parse(format!("trailing token {t:?}"))),
    }
  }

  fn peek(&self) -> Option<&Token> { self.tokens.get(self.pos) }

  fn advance(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).cloned();
    if token.is_some() {
      self.pos += 1;
    }
    token
  }

  fn eat(&mut self, expected: &Token) -> bool {
    if self.peek() == Some(expected) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn or_expr(&mut self) -> ScriptResult<Expr> {
    let mut left = self.and_expr()?;
    while self.eat(&Token::OrOr) {
      let right = self.and_expr()?;
      left = Expr::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
  }

  fn and_expr(&mut self) -> ScriptResult<Expr> {
    let mut left = self.cmp_expr()?;
    while self.eat(&Token::AndAnd) {
      let right = self.cmp_expr()?;
      left = Expr::And(Box::new(left), Box::new(right));
    }
    Ok(left)
  }

  fn cmp_expr(&mut self) -> ScriptResult<Expr> {
    let left = self.unary_expr()?;
    let op = match self.peek() {
      Some(Token::Lt) => CmpOp::Lt,
      Some(Token::Le) => CmpOp::Le,
      Some(Token::Gt) => CmpOp::Gt,
      Some(Token::Ge) => CmpOp::Ge,
      Some(Token::Eq) => CmpOp::Eq,
      Some(Token::Ne) => CmpOp::Ne,
      _ => return Ok(left),
    };
    self.pos += 1;
    let right = self.unary_expr()?;
    Ok(Expr::Cmp(op, Box::new(left), Box::new(right)))
  }

  fn unary_expr(&mut self) -> ScriptResult<Expr> {
    if self.eat(&Token::Not) {
      return Ok(Expr::Not(Box::new(self.unary_expr()?)));
    }
    self.postfix_expr()
  }

  fn postfix_expr(&mut self) -> ScriptResult<Expr> {
    let mut expr = self.primary_expr()?;
    while self.eat(&Token::Dot) {
      let name = match self.advance() {
        Some(Token::Ident(name)) => name,
        other => {
          return Err(ScriptError::Parse(format!(
            "expected member name, found {other:?}"
          )));
        }
      };
      expr = if self.eat(&Token::LParen) {
        let args = self.call_args()?;
        let method = match name.as_str() {
          "includes" | "contains" => Method::Includes,
          "startsWith" => Method::StartsWith,
          "endsWith" => Method::EndsWith,
          "trim" => Method::Trim,
          "toLowerCase" => Method::ToLowerCase,
          "toUpperCase" => Method::ToUpperCase,
          _ => return Err(ScriptError::UnknownMethod(name)),
        };
        Expr::Method(method, Box::new(expr), args)
      } else if name == "length" {
        Expr::Length(Box::new(expr))
      } else {
        return Err(ScriptError::UnknownMethod(name));
      };
    }
    Ok(expr)
  }

  fn call_args(&mut self) -> ScriptResult<Vec<Expr>> {
    let mut args = Vec::new();
    if self.eat(&Token::RParen) {
      return Ok(args);
    }
    loop {
      args.push(self.or_expr()?);
      if self.eat(&Token::RParen) {
        return Ok(args);
      }
      if !self.eat(&Token::Comma) {
        return Err(ScriptError::Parse("expected `,` or `)` in call".into()));
      }
    }
  }

  fn primary_expr(&mut self) -> ScriptResult<Expr> {
    match self.advance() {
      Some(Token::Num(n)) => Ok(Expr::Num(n)),
      Some(Token::Str(s)) => Ok(Expr::Str(s)),
      Some(Token::Ident(name)) => match name.as_str() {
        "true" => Ok(Expr::Bool(true)),
        "false" => Ok(Expr::Bool(false)),
        _ if name == self.param => Ok(Expr::Param),
        _ => Err(ScriptError::UnknownIdentifier(name)),
      },
      Some(Token::LParen) => {
        let expr = self.or_expr()?;
        if self.eat(&Token::RParen) {
          Ok(expr)
        } else {
          Err(ScriptError::Parse("expected `)`".into()))
        }
      }
      other => Err(ScriptError::Parse(format!(
        "expected expression, found {other:?}"
      ))),
    }
  }
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Value {
  Str(String),
  Num(f64),
  Bool(bool),
}

impl Value {
  fn truthy(&self) -> bool {
    match self {
      Self::Str(s) => !s.is_empty(),
      Self::Num(n) => *n != 0.0,
      Self::Bool(b) => *b,
    }
  }

  fn as_str(&self, context: &str) -> ScriptResult<&str> {
    match self {
      Self::Str(s) => Ok(s),
      other => Err(ScriptError::Type(format!(
        "{context} requires a string, got {other:?}"
      ))),
    }
  }
}

fn eval(expr: &Expr, content: &str, fuel: &mut u32) -> ScriptResult<Value> {
  *fuel = fuel.checked_sub(1).ok_or(ScriptError::FuelExhausted)?;

  match expr {
    Expr::Str(s) => Ok(Value::Str(s.clone())),
    Expr::Num(n) => Ok(Value::Num(*n)),
    Expr::Bool(b) => Ok(Value::Bool(*b)),
    Expr::Param => Ok(Value::Str(content.to_owned())),
    Expr::Not(inner) => {
      Ok(Value::Bool(!eval(inner, content, fuel)?.truthy()))
    }
    Expr::And(left, right) => {
      let left = eval(left, content, fuel)?;
      if !left.truthy() {
        return Ok(Value::Bool(false));
      }
      Ok(Value::Bool(eval(right, content, fuel)?.truthy()))
    }
    Expr::Or(left, right) => {
      let left = eval(left, content, fuel)?;
      if left.truthy() {
        return Ok(Value::Bool(true));
      }
      Ok(Value::Bool(eval(right, content, fuel)?.truthy()))
    }
    Expr::Cmp(op, left, right) => {
      let left = eval(left, content, fuel)?;
      let right = eval(right, content, fuel)?;
      compare(*op, &left, &right)
    }
    Expr::Length(inner) => {
      let value = eval(inner, content, fuel)?;
      let s = value.as_str("`.length`")?;
      Ok(Value::Num(s.chars().count() as f64))
    }
    Expr::Method(method, receiver, args) => {
      let receiver = eval(receiver, content, fuel)?;
      let receiver = receiver.as_str("method receiver")?;
      let args = args
        .iter()
        .map(|a| eval(a, content, fuel))
        .collect::<ScriptResult<Vec<_>>>()?;
      apply_method(*method, receiver, &args)
    }
  }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> ScriptResult<Value> {
  use std::cmp::Ordering;

  let ordering = match (left, right) {
    (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
    (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
    (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
    _ => None,
  };

  let result = match (op, ordering) {
    // Mixed-type equality is simply unequal.
    (CmpOp::Eq, ordering) => ordering == Some(Ordering::Equal),
    (CmpOp::Ne, ordering) => ordering != Some(Ordering::Equal),
    (_, None) => {
      return Err(ScriptError::Type(format!(
        "cannot order {left:?} against {right:?}"
      )));
    }
    (CmpOp::Lt, Some(o)) => o == Ordering::Less,
    (CmpOp::Le, Some(o)) => o != Ordering::Greater,
    (CmpOp::Gt, Some(o)) => o == Ordering::Greater,
    (CmpOp::Ge, Some(o)) => o != Ordering::Less,
  };
  Ok(Value::Bool(result))
}

fn apply_method(
  method: Method,
  receiver: &str,
  args: &[Value],
) -> ScriptResult<Value> {
  let one_str_arg = |name: &str| -> ScriptResult<&str> {
    match args {
      [arg] => arg.as_str(name),
      _ => Err(ScriptError::Type(format!(
        "{name} takes exactly one string argument"
      ))),
    }
  };

  match method {
    Method::Includes => {
      Ok(Value::Bool(receiver.contains(one_str_arg("`includes`")?)))
    }
    Method::StartsWith => {
      Ok(Value::Bool(receiver.starts_with(one_str_arg("`startsWith`")?)))
    }
    Method::EndsWith => {
      Ok(Value::Bool(receiver.ends_with(one_str_arg("`endsWith`")?)))
    }
    Method::Trim => no_args(args, "`trim`")
      .map(|()| Value::Str(receiver.trim().to_owned())),
    Method::ToLowerCase => no_args(args, "`toLowerCase`")
      .map(|()| Value::Str(receiver.to_lowercase())),
    Method::ToUpperCase => no_args(args, "`toUpperCase`")
      .map(|()| Value::Str(receiver.to_uppercase())),
  }
}

fn no_args(args: &[Value], name: &str) -> ScriptResult<()> {
  if args.is_empty() {
    Ok(())
  } else {
    Err(ScriptError::Type(format!("{name} takes no arguments")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn predicate(script: &str) -> ScriptPredicate {
    ScriptPredicate::parse(script).unwrap()
  }

  #[test]
  fn non_empty_content_check() {
    let p =
      predicate("function ok(content) { return content.length > 0; }");
    assert_eq!(p.name(), "ok");
    assert!(p.invoke("anything").unwrap());
    assert!(!p.invoke("").unwrap());
  }

  #[test]
  fn parameter_name_is_bound_not_hardcoded() {
    let p = predicate("function check(text) { return text.length >= 3; }");
    assert!(p.invoke("abc").unwrap());
    assert!(!p.invoke("ab").unwrap());
  }

  #[test]
  fn includes_and_logic() {
    let p = predicate(
      "function usesPostgres(content) {\n  return content.includes('postgres') || content.includes('PostgreSQL');\n}",
    );
    assert!(p.invoke("we use PostgreSQL 16").unwrap());
    assert!(p.invoke("postgresql via postgres image").unwrap());
    assert!(!p.invoke("we use sqlite").unwrap());
  }

  #[test]
  fn chained_methods() {
    let p = predicate(
      "function trimmed(content) { return content.trim().toLowerCase().startsWith(\"use\"); }",
    );
    assert!(p.invoke("  USE postgres  ").unwrap());
    assert!(!p.invoke("  do not  ").unwrap());
  }

  #[test]
  fn strict_and_loose_equality_both_parse() {
    let p = predicate("function empty(c) { return c === ''; }");
    assert!(p.invoke("").unwrap());
    let p = predicate("function ne(c) { return c != 'x'; }");
    assert!(p.invoke("y").unwrap());
    assert!(!p.invoke("x").unwrap());
  }

  #[test]
  fn bare_parameter_is_truthiness() {
    let p = predicate("function any(content) { return content; }");
    assert!(p.invoke("x").unwrap());
    assert!(!p.invoke("").unwrap());
  }

  #[test]
  fn negation_and_parens() {
    let p = predicate(
      "function short(c) { return !(c.length > 10) && c.length > 0; }",
    );
    assert!(p.invoke("short").unwrap());
    assert!(!p.invoke("this one is definitely too long").unwrap());
    assert!(!p.invoke("").unwrap());
  }

  #[test]
  fn script_without_function_header_fails() {
    assert_eq!(
      ScriptPredicate::parse("const x = 1;").unwrap_err(),
      ScriptError::NoFunction
    );
  }

  #[test]
  fn body_without_return_fails() {
    assert_eq!(
      ScriptPredicate::parse("function f(c) { c.length; }").unwrap_err(),
      ScriptError::NoReturn
    );
  }

  #[test]
  fn unknown_identifier_fails_at_parse() {
    let err =
      ScriptPredicate::parse("function f(c) { return other.length > 0; }")
        .unwrap_err();
    assert!(matches!(err, ScriptError::UnknownIdentifier(name) if name == "other"));
  }

  #[test]
  fn string_with_braces_does_not_confuse_body_extraction() {
    let p = predicate(
      "function f(c) { return c.includes('{\"key\": true}'); }",
    );
    assert!(p.invoke("payload {\"key\": true} here").unwrap());
  }

  #[test]
  fn invocations_share_no_state() {
    let p = predicate("function f(c) { return c.length > 2; }");
    assert!(!p.invoke("a").unwrap());
    assert!(p.invoke("abc").unwrap());
    assert!(!p.invoke("b").unwrap());
  }
}
