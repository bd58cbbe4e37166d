//! # Expressions
//!
//! Row-level expressions used as selection predicates, traversal
//! conditions and attribute mutations.
//!
//! Expressions are plain data (`Expr`), resolved eagerly at call time
//! against a [`RowAccess`] implementation. They can be built in Rust with
//! the helper constructors or parsed from text:
//!
//! ```
//! use propgraph_core::expr::Expr;
//!
//! let e = Expr::parse("weight * 2 > 5 & type == 'a'").expect("parse");
//! assert!(e.columns().contains("weight"));
//! ```
//!
//! ## Semantics
//!
//! - `Missing` propagates through arithmetic and comparisons.
//! - `&` / `|` use three-valued logic (`FALSE & NA` is `FALSE`).
//! - Integer arithmetic stays integral until it overflows or divides.
//! - A predicate selects a row only when it evaluates to `TRUE`.

use crate::primitives::MAX_EXPRESSION_LENGTH;
use crate::{GraphError, Value};
use serde::{Deserialize, Serialize};
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token as SqlToken, Tokenizer};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::iter::Peekable;

// =============================================================================
// ROW ACCESS
// =============================================================================

/// Read access to the cells of one row.
pub trait RowAccess {
    /// Value of `name` for this row, or `None` when the column does not
    /// exist in the table at all.
    fn column(&self, name: &str) -> Option<Value>;
}

// =============================================================================
// AST
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Built-in functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Func {
    IsNa,
    Abs,
    Round,
    Floor,
    Ceiling,
    Sqrt,
    Log,
    Exp,
    IfElse,
    Coalesce,
    Paste,
    Contains,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "is_na" | "is.na" => Self::IsNa,
            "abs" => Self::Abs,
            "round" => Self::Round,
            "floor" => Self::Floor,
            "ceiling" => Self::Ceiling,
            "sqrt" => Self::Sqrt,
            "log" => Self::Log,
            "exp" => Self::Exp,
            "if_else" | "ifelse" => Self::IfElse,
            "coalesce" => Self::Coalesce,
            "paste" => Self::Paste,
            "contains" => Self::Contains,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::IsNa => "is_na",
            Self::Abs => "abs",
            Self::Round => "round",
            Self::Floor => "floor",
            Self::Ceiling => "ceiling",
            Self::Sqrt => "sqrt",
            Self::Log => "log",
            Self::Exp => "exp",
            Self::IfElse => "if_else",
            Self::Coalesce => "coalesce",
            Self::Paste => "paste",
            Self::Contains => "contains",
        }
    }

    /// Accepted argument counts (inclusive range, `None` = unbounded).
    fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Round => (1, Some(2)),
            Self::IfElse => (3, Some(3)),
            Self::Contains => (2, Some(2)),
            Self::Coalesce | Self::Paste => (1, None),
            _ => (1, Some(1)),
        }
    }

    fn check_arity(self, given: usize) -> Result<(), GraphError> {
        let (min, max) = self.arity();
        if given < min || max.is_some_and(|m| given > m) {
            return Err(GraphError::Expression(format!(
                "{}() called with {} argument(s)",
                self.name(),
                given
            )));
        }
        Ok(())
    }
}

/// An expression over the columns of a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Value),
    Column(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Self::Literal(v)
    }
}

impl Expr {
    /// Reference a column.
    #[must_use]
    pub fn col(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    /// A literal value.
    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    fn binary(self, op: BinaryOp, rhs: Self) -> Self {
        Self::Binary(op, Box::new(self), Box::new(rhs))
    }

    #[must_use]
    pub fn gt(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    #[must_use]
    pub fn ge(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Ge, rhs)
    }

    #[must_use]
    pub fn lt(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    #[must_use]
    pub fn le(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Le, rhs)
    }

    #[must_use]
    pub fn equals(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    #[must_use]
    pub fn not_equals(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Ne, rhs)
    }

    #[must_use]
    pub fn and(self, rhs: Self) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    #[must_use]
    pub fn or(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    #[must_use]
    pub fn plus(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Add, rhs)
    }

    #[must_use]
    pub fn minus(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Sub, rhs)
    }

    #[must_use]
    pub fn times(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Mul, rhs)
    }

    #[must_use]
    pub fn divided_by(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Div, rhs)
    }

    /// Parse an expression from source text.
    pub fn parse(src: &str) -> Result<Self, GraphError> {
        if src.len() > MAX_EXPRESSION_LENGTH {
            return Err(GraphError::Expression(format!(
                "expression exceeds {} bytes",
                MAX_EXPRESSION_LENGTH
            )));
        }
        let tokens = tokenize(src)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        match parser.peek() {
            Token::End => Ok(expr),
            other => Err(GraphError::Expression(format!(
                "unexpected {} in `{}`",
                other.describe(),
                src
            ))),
        }
    }

    /// All column names referenced by the expression.
    #[must_use]
    pub fn columns(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Literal(_) => {}
            Self::Column(name) => {
                out.insert(name.clone());
            }
            Self::Unary(_, e) => e.collect_columns(out),
            Self::Binary(_, l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Self::Call(_, args) => args.iter().for_each(|a| a.collect_columns(out)),
        }
    }

    /// Check every call against the argument count its function accepts.
    ///
    /// Parsed expressions always pass; expressions built by hand or
    /// decoded from a file may not.
    pub fn validate(&self) -> Result<(), GraphError> {
        match self {
            Self::Literal(_) | Self::Column(_) => Ok(()),
            Self::Unary(_, e) => e.validate(),
            Self::Binary(_, l, r) => {
                l.validate()?;
                r.validate()
            }
            Self::Call(func, args) => {
                func.check_arity(args.len())?;
                args.iter().try_for_each(Expr::validate)
            }
        }
    }

    /// Evaluate against a row.
    pub fn eval<R: RowAccess + ?Sized>(&self, row: &R) -> Result<Value, GraphError> {
        match self {
            Self::Literal(v) => Ok(v.clone()),
            Self::Column(name) => row
                .column(name)
                .ok_or_else(|| GraphError::Expression(format!("unknown column `{}`", name))),
            Self::Unary(op, e) => eval_unary(*op, e.eval(row)?),
            Self::Binary(BinaryOp::And, l, r) => eval_and(l, r, row),
            Self::Binary(BinaryOp::Or, l, r) => eval_or(l, r, row),
            Self::Binary(op, l, r) => eval_binary(*op, l.eval(row)?, r.eval(row)?),
            Self::Call(func, args) => eval_call(*func, args, row),
        }
    }

    /// Evaluate as a predicate: only `TRUE` selects; `FALSE` and `NA` do not.
    pub fn matches<R: RowAccess + ?Sized>(&self, row: &R) -> Result<bool, GraphError> {
        match self.eval(row)? {
            Value::Bool(b) => Ok(b),
            v if v.is_missing() => Ok(false),
            other => Err(GraphError::Expression(format!(
                "predicate must be logical, got {}",
                other.type_name()
            ))),
        }
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

#[derive(Clone, Copy)]
enum Num {
    I(i64),
    F(f64),
}

impl Num {
    fn f(self) -> f64 {
        match self {
            Self::I(i) => i as f64,
            Self::F(x) => x,
        }
    }
}

fn numeric(v: &Value, op: &str) -> Result<Num, GraphError> {
    match v {
        Value::Int(i) => Ok(Num::I(*i)),
        Value::Float(x) => Ok(Num::F(*x)),
        Value::Bool(b) => Ok(Num::I(i64::from(*b))),
        other => Err(GraphError::Expression(format!(
            "cannot apply `{}` to {}",
            op,
            other.type_name()
        ))),
    }
}

fn logical(v: &Value, op: &str) -> Result<Option<bool>, GraphError> {
    match v {
        Value::Bool(b) => Ok(Some(*b)),
        v if v.is_missing() => Ok(None),
        other => Err(GraphError::Expression(format!(
            "`{}` expects logical operands, got {}",
            op,
            other.type_name()
        ))),
    }
}

#[allow(clippy::float_arithmetic)]
fn eval_unary(op: UnaryOp, v: Value) -> Result<Value, GraphError> {
    if v.is_missing() {
        return Ok(Value::Missing);
    }
    match op {
        UnaryOp::Neg => Ok(match numeric(&v, "-")? {
            Num::I(i) => i.checked_neg().map_or(Value::Float(-(i as f64)), Value::Int),
            Num::F(x) => Value::Float(-x),
        }),
        UnaryOp::Not => Ok(Value::from(logical(&v, "!")?.map(|b| !b))),
    }
}

fn eval_and<R: RowAccess + ?Sized>(l: &Expr, r: &Expr, row: &R) -> Result<Value, GraphError> {
    let lhs = logical(&l.eval(row)?, "&")?;
    if lhs == Some(false) {
        return Ok(Value::Bool(false));
    }
    let rhs = logical(&r.eval(row)?, "&")?;
    Ok(match (lhs, rhs) {
        (_, Some(false)) => Value::Bool(false),
        (Some(true), Some(true)) => Value::Bool(true),
        _ => Value::Missing,
    })
}

fn eval_or<R: RowAccess + ?Sized>(l: &Expr, r: &Expr, row: &R) -> Result<Value, GraphError> {
    let lhs = logical(&l.eval(row)?, "|")?;
    if lhs == Some(true) {
        return Ok(Value::Bool(true));
    }
    let rhs = logical(&r.eval(row)?, "|")?;
    Ok(match (lhs, rhs) {
        (_, Some(true)) => Value::Bool(true),
        (Some(false), Some(false)) => Value::Bool(false),
        _ => Value::Missing,
    })
}

fn eval_binary(op: BinaryOp, a: Value, b: Value) -> Result<Value, GraphError> {
    if a.is_missing() || b.is_missing() {
        return Ok(Value::Missing);
    }
    match op {
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = a.compare(&b) == Some(Ordering::Equal);
            Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = a.compare(&b).ok_or_else(|| {
                GraphError::Expression(format!(
                    "cannot compare {} with {}",
                    a.type_name(),
                    b.type_name()
                ))
            })?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        _ => arithmetic(op, &a, &b),
    }
}

#[allow(clippy::float_arithmetic)]
fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, GraphError> {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        _ => "^",
    };
    let (x, y) = (numeric(a, symbol)?, numeric(b, symbol)?);
    let value = match (op, x, y) {
        (BinaryOp::Add, Num::I(i), Num::I(j)) => i.checked_add(j).map(Value::Int),
        (BinaryOp::Sub, Num::I(i), Num::I(j)) => i.checked_sub(j).map(Value::Int),
        (BinaryOp::Mul, Num::I(i), Num::I(j)) => i.checked_mul(j).map(Value::Int),
        (BinaryOp::Rem, Num::I(_), Num::I(0)) => Some(Value::Missing),
        (BinaryOp::Rem, Num::I(i), Num::I(j)) => {
            // Result takes the sign of the divisor; only i64::MIN % -1 overflows, and it is 0.
            let r = i.checked_rem(j).unwrap_or(0);
            Some(Value::Int(if r != 0 && ((r < 0) != (j < 0)) { r + j } else { r }))
        }
        _ => None,
    };
    if let Some(v) = value {
        return Ok(v);
    }
    let (p, q) = (x.f(), y.f());
    Ok(Value::Float(match op {
        BinaryOp::Add => p + q,
        BinaryOp::Sub => p - q,
        BinaryOp::Mul => p * q,
        BinaryOp::Div => p / q,
        BinaryOp::Rem => p - q * (p / q).floor(),
        _ => p.powf(q),
    }))
}

fn unary_math(v: &Value, name: &str, f: impl Fn(f64) -> f64) -> Result<Value, GraphError> {
    if v.is_missing() {
        return Ok(Value::Missing);
    }
    Ok(Value::Float(f(numeric(v, name)?.f())))
}

fn argument<T>(items: &[T], i: usize, func: Func) -> Result<&T, GraphError> {
    items.get(i).ok_or_else(|| {
        GraphError::Expression(format!("{}() is missing argument {}", func.name(), i + 1))
    })
}

#[allow(clippy::float_arithmetic)]
fn eval_call<R: RowAccess + ?Sized>(
    func: Func,
    args: &[Expr],
    row: &R,
) -> Result<Value, GraphError> {
    func.check_arity(args.len())?;

    // Branches of if_else and coalesce are evaluated lazily.
    match func {
        Func::IfElse => {
            return match logical(&argument(args, 0, func)?.eval(row)?, "if_else")? {
                Some(true) => argument(args, 1, func)?.eval(row),
                Some(false) => argument(args, 2, func)?.eval(row),
                None => Ok(Value::Missing),
            };
        }
        Func::Coalesce => {
            for arg in args {
                let v = arg.eval(row)?;
                if !v.is_missing() {
                    return Ok(v);
                }
            }
            return Ok(Value::Missing);
        }
        _ => {}
    }

    let values = args
        .iter()
        .map(|a| a.eval(row))
        .collect::<Result<Vec<_>, _>>()?;
    let first = argument(&values, 0, func)?;

    match func {
        Func::IsNa => Ok(Value::Bool(first.is_missing())),
        Func::Abs => match first {
            Value::Int(i) => Ok(i.checked_abs().map_or(Value::Float((*i as f64).abs()), Value::Int)),
            v => unary_math(v, "abs", f64::abs),
        },
        Func::Round => {
            let digits = match values.get(1) {
                Some(Value::Int(d)) => *d,
                Some(other) => {
                    return Err(GraphError::Expression(format!(
                        "round() digits must be an integer, got {}",
                        other.type_name()
                    )));
                }
                None => 0,
            };
            match first {
                Value::Int(_) if digits >= 0 => Ok(first.clone()),
                v => {
                    let scale = 10f64.powi(digits.clamp(-15, 15) as i32);
                    unary_math(v, "round", |x| (x * scale).round_ties_even() / scale)
                }
            }
        }
        Func::Floor => match first {
            Value::Int(_) => Ok(first.clone()),
            v => unary_math(v, "floor", f64::floor),
        },
        Func::Ceiling => match first {
            Value::Int(_) => Ok(first.clone()),
            v => unary_math(v, "ceiling", f64::ceil),
        },
        Func::Sqrt => unary_math(first, "sqrt", f64::sqrt),
        Func::Log => unary_math(first, "log", f64::ln),
        Func::Exp => unary_math(first, "exp", f64::exp),
        Func::Paste => Ok(Value::Str(
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        )),
        Func::Contains => match (first, argument(&values, 1, func)?) {
            (a, b) if a.is_missing() || b.is_missing() => Ok(Value::Missing),
            (Value::Str(hay), Value::Str(needle)) => Ok(Value::Bool(hay.contains(needle.as_str()))),
            (a, b) => Err(GraphError::Expression(format!(
                "contains() expects strings, got {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        },
        Func::IfElse | Func::Coalesce => Ok(Value::Missing),
    }
}

// =============================================================================
// TOKENS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Value),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    End,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Num(v) => format!("number {}", v),
            Self::Str(s) => format!("string '{}'", s),
            Self::Ident(s) => format!("identifier `{}`", s),
            Self::Op(op) => format!("operator `{}`", op),
            Self::LParen => "`(`".to_string(),
            Self::RParen => "`)`".to_string(),
            Self::Comma => "`,`".to_string(),
            Self::End => "end of input".to_string(),
        }
    }
}

/// Split `src` with the SQL tokenizer and fold its tokens into the
/// expression grammar: `%%`, `&&` and `||` may arrive as pairs, dotted
/// names (`is.na`) as word-period-word, and double-quoted text as a
/// delimited identifier that is read back as a string literal.
fn tokenize(src: &str) -> Result<Vec<Token>, GraphError> {
    let dialect = GenericDialect {};
    let raw: Vec<SqlToken> = Tokenizer::new(&dialect, src)
        .tokenize()
        .map_err(|e| GraphError::Expression(format!("cannot tokenize `{}`: {}", src, e)))?
        .into_iter()
        .filter(|t| !matches!(t, SqlToken::Whitespace(_) | SqlToken::EOF))
        .collect();

    let mut tokens = Vec::with_capacity(raw.len() + 1);
    let mut iter = raw.into_iter().peekable();
    while let Some(token) = iter.next() {
        let mapped = match token {
            SqlToken::Number(text, _) => Token::Num(number(&text)?),
            SqlToken::SingleQuotedString(s) | SqlToken::DoubleQuotedString(s) => Token::Str(s),
            SqlToken::Word(w) if matches!(w.quote_style, Some('"' | '\'')) => Token::Str(w.value),
            SqlToken::Word(w) => Token::Ident(w.value),
            SqlToken::Period => match (tokens.last_mut(), iter.next()) {
                (Some(Token::Ident(name)), Some(SqlToken::Word(w))) => {
                    name.push('.');
                    name.push_str(&w.value);
                    continue;
                }
                _ => {
                    return Err(GraphError::Expression(format!(
                        "unexpected `.` in `{}`",
                        src
                    )));
                }
            },
            SqlToken::LParen => Token::LParen,
            SqlToken::RParen => Token::RParen,
            SqlToken::Comma => Token::Comma,
            SqlToken::DoubleEq => Token::Op("=="),
            SqlToken::Eq => Token::Op("="),
            SqlToken::Neq => Token::Op("!="),
            SqlToken::Lt => Token::Op("<"),
            SqlToken::LtEq => Token::Op("<="),
            SqlToken::Gt => Token::Op(">"),
            SqlToken::GtEq => Token::Op(">="),
            SqlToken::Plus => Token::Op("+"),
            SqlToken::Minus => Token::Op("-"),
            SqlToken::Mul => Token::Op("*"),
            SqlToken::Div => Token::Op("/"),
            SqlToken::Caret => Token::Op("^"),
            SqlToken::ExclamationMark => Token::Op("!"),
            SqlToken::DoubleExclamationMark => {
                tokens.push(Token::Op("!"));
                Token::Op("!")
            }
            SqlToken::Overlap => Token::Op("&&"),
            SqlToken::StringConcat => Token::Op("||"),
            SqlToken::Mod => Token::Op(pair(&mut iter, &SqlToken::Mod, "%", "%%")),
            SqlToken::Ampersand => Token::Op(pair(&mut iter, &SqlToken::Ampersand, "&", "&&")),
            SqlToken::Pipe => Token::Op(pair(&mut iter, &SqlToken::Pipe, "|", "||")),
            SqlToken::CustomBinaryOperator(op) => Token::Op(custom_operator(&op)?),
            other => {
                return Err(GraphError::Expression(format!(
                    "unexpected `{}` in `{}`",
                    other, src
                )));
            }
        };
        tokens.push(mapped);
    }
    tokens.push(Token::End);
    Ok(tokens)
}

/// `single` unless the next token repeats `token`, in which case both are
/// consumed as `double`.
fn pair(
    iter: &mut Peekable<impl Iterator<Item = SqlToken>>,
    token: &SqlToken,
    single: &'static str,
    double: &'static str,
) -> &'static str {
    if iter.next_if_eq(token).is_some() {
        double
    } else {
        single
    }
}

fn custom_operator(op: &str) -> Result<&'static str, GraphError> {
    const KNOWN: [&str; 6] = ["%%", "&&", "||", "==", "!=", "%"];
    KNOWN
        .into_iter()
        .find(|k| *k == op)
        .ok_or_else(|| GraphError::Expression(format!("unknown operator `{}`", op)))
}

/// Integer when the literal fits an `i64`, float otherwise.
fn number(text: &str) -> Result<Value, GraphError> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    text.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| GraphError::Expression(format!("invalid number `{}`", text)))
}

// =============================================================================
// PARSER
// =============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::End)
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if token != Token::End {
            self.pos += 1;
        }
        token
    }

    fn eat_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Token::Op(op) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), GraphError> {
        let token = self.next();
        if &token == expected {
            Ok(())
        } else {
            Err(GraphError::Expression(format!(
                "expected {}, found {}",
                expected.describe(),
                token.describe()
            )))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, GraphError> {
        let mut lhs = self.parse_and()?;
        while self.eat_op(&["|", "||"]).is_some() {
            lhs = lhs.or(self.parse_and()?);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, GraphError> {
        let mut lhs = self.parse_not()?;
        while self.eat_op(&["&", "&&"]).is_some() {
            lhs = lhs.and(self.parse_not()?);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, GraphError> {
        if self.eat_op(&["!"]).is_some() {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, GraphError> {
        let lhs = self.parse_additive()?;
        let op = match self.eat_op(&["==", "!=", "<", "<=", ">", ">="]) {
            Some("==") => BinaryOp::Eq,
            Some("!=") => BinaryOp::Ne,
            Some("<") => BinaryOp::Lt,
            Some("<=") => BinaryOp::Le,
            Some(">") => BinaryOp::Gt,
            Some(">=") => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        Ok(lhs.binary(op, self.parse_additive()?))
    }

    fn parse_additive(&mut self) -> Result<Expr, GraphError> {
        let mut lhs = self.parse_multiplicative()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let rhs = self.parse_multiplicative()?;
            lhs = if op == "+" { lhs.plus(rhs) } else { lhs.minus(rhs) };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, GraphError> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "%", "%%"]) {
            let rhs = self.parse_unary()?;
            lhs = match op {
                "*" => lhs.times(rhs),
                "/" => lhs.divided_by(rhs),
                _ => lhs.binary(BinaryOp::Rem, rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, GraphError> {
        match self.eat_op(&["-", "+"]) {
            Some("-") => Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?))),
            Some(_) => self.parse_unary(),
            None => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, GraphError> {
        let base = self.parse_primary()?;
        if self.eat_op(&["^"]).is_some() {
            return Ok(base.binary(BinaryOp::Pow, self.parse_unary()?));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, GraphError> {
        match self.next() {
            Token::Num(v) => Ok(Expr::Literal(v)),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.peek() == &Token::LParen {
                    return self.parse_call(&name);
                }
                Ok(match name.as_str() {
                    "TRUE" | "true" => Expr::Literal(Value::Bool(true)),
                    "FALSE" | "false" => Expr::Literal(Value::Bool(false)),
                    "NA" | "null" => Expr::Literal(Value::Missing),
                    "Inf" => Expr::Literal(Value::Float(f64::INFINITY)),
                    _ => Expr::Column(name),
                })
            }
            other => Err(GraphError::Expression(format!(
                "unexpected {}",
                other.describe()
            ))),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, GraphError> {
        let func = Func::from_name(name)
            .ok_or_else(|| GraphError::Expression(format!("unknown function `{}`", name)))?;
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() != &Token::RParen {
            loop {
                args.push(self.parse_or()?);
                if self.peek() == &Token::Comma {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;

        func.check_arity(args.len())?;
        Ok(Expr::Call(func, args))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct Row(BTreeMap<String, Value>);

    impl RowAccess for Row {
        fn column(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
    }

    fn row(cells: &[(&str, Value)]) -> Row {
        Row(cells
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect())
    }

    fn eval(src: &str, r: &Row) -> Value {
        Expr::parse(src).expect("parse").eval(r).expect("eval")
    }

    #[test]
    fn precedence_and_integer_arithmetic() {
        let r = row(&[]);
        assert_eq!(eval("1 + 2 * 3", &r), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3", &r), Value::Int(9));
        assert_eq!(eval("-2 ^ 2", &r), Value::Float(-4.0));
        assert_eq!(eval("7 / 2", &r), Value::Float(3.5));
        assert_eq!(eval("-1 %% 3", &r), Value::Int(2));
    }

    #[test]
    fn missing_propagates() {
        let r = row(&[("w", Value::Missing)]);
        assert_eq!(eval("w + 1", &r), Value::Missing);
        assert_eq!(eval("w > 1", &r), Value::Missing);
        assert_eq!(eval("is_na(w)", &r), Value::Bool(true));
        assert_eq!(eval("coalesce(w, 4)", &r), Value::Int(4));
    }

    #[test]
    fn three_valued_logic() {
        let r = row(&[("w", Value::Missing)]);
        assert_eq!(eval("FALSE & w > 1", &r), Value::Bool(false));
        assert_eq!(eval("TRUE | w > 1", &r), Value::Bool(true));
        assert_eq!(eval("TRUE & w > 1", &r), Value::Missing);
    }

    #[test]
    fn predicate_only_true_matches() {
        let r = row(&[("w", Value::Missing), ("t", Value::from("a"))]);
        let missing = Expr::parse("w > 1").expect("parse");
        assert!(!missing.matches(&r).expect("matches"));
        let typed = Expr::parse("t == 'a'").expect("parse");
        assert!(typed.matches(&r).expect("matches"));
        let non_logical = Expr::parse("t").expect("parse");
        assert!(non_logical.matches(&r).is_err());
    }

    #[test]
    fn unknown_column_is_an_error() {
        let r = row(&[]);
        let e = Expr::parse("nope > 1").expect("parse");
        assert!(matches!(e.eval(&r), Err(GraphError::Expression(_))));
    }

    #[test]
    fn functions() {
        let r = row(&[("x", Value::Float(2.345)), ("s", Value::from("hello"))]);
        assert_eq!(eval("round(x, 2)", &r), Value::Float(2.35));
        assert_eq!(eval("contains(s, 'ell')", &r), Value::Bool(true));
        assert_eq!(eval("if_else(x > 2, 'big', 'small')", &r), Value::from("big"));
        assert_eq!(eval("paste(s, 1)", &r), Value::from("hello 1"));
    }

    #[test]
    fn parse_errors() {
        assert!(Expr::parse("1 +").is_err());
        assert!(Expr::parse("foo(1)").is_err());
        assert!(Expr::parse("round()").is_err());
        assert!(Expr::parse("'open").is_err());
        assert!(Expr::parse("a = 1").is_err());
    }

    #[test]
    fn operator_spellings() {
        let r = row(&[("w", Value::Missing), ("s", Value::from("city"))]);
        assert_eq!(eval("TRUE && FALSE", &r), Value::Bool(false));
        assert_eq!(eval("FALSE || TRUE", &r), Value::Bool(true));
        assert_eq!(eval("!FALSE", &r), Value::Bool(true));
        assert_eq!(eval("7 %% 3", &r), Value::Int(1));
        assert_eq!(eval("7 % 3", &r), Value::Int(1));
        assert_eq!(eval("s == \"city\"", &r), Value::Bool(true));
        assert_eq!(eval("is.na(w)", &r), Value::Bool(true));
        assert_eq!(eval("2.5e1", &r), Value::Float(25.0));
        assert!(Expr::parse("1 ? 2").is_err());
    }

    #[test]
    fn integer_overflow_does_not_panic() {
        let r = row(&[("x", Value::Int(i64::MIN))]);
        assert_eq!(eval("x %% -1", &r), Value::Int(0));
        assert_eq!(eval("x %% 3", &r), Value::Int(i64::MIN.rem_euclid(3)));
        assert!(matches!(eval("x * x", &r), Value::Float(_)));
        assert!(matches!(eval("x - 1", &r), Value::Float(_)));
        assert!(matches!(eval("-x", &r), Value::Float(_)));
        assert!(matches!(eval("abs(x)", &r), Value::Float(_)));
        assert!(matches!(eval("x / -1", &r), Value::Float(_)));
    }

    #[test]
    fn hand_built_calls_are_checked() {
        let r = row(&[]);
        let cases = [
            Expr::Call(Func::Abs, vec![]),
            Expr::Call(Func::IfElse, vec![Expr::lit(true), Expr::lit(1)]),
            Expr::Call(Func::Contains, vec![Expr::lit("a")]),
            Expr::Call(Func::Round, vec![Expr::lit(1), Expr::lit(2), Expr::lit(3)]),
        ];
        for expr in cases {
            assert!(matches!(expr.validate(), Err(GraphError::Expression(_))));
            assert!(matches!(expr.eval(&r), Err(GraphError::Expression(_))));
        }

        let nested = Expr::col("w").gt(Expr::Call(Func::Sqrt, vec![]));
        assert!(nested.validate().is_err());
        Expr::parse("if_else(w > 1, abs(w), 0)")
            .expect("parse")
            .validate()
            .expect("parsed calls are well formed");
    }

    #[test]
    fn builder_matches_parser() {
        let built = Expr::col("w").gt(Expr::lit(3));
        assert_eq!(built, Expr::parse("w > 3").expect("parse"));
        assert_eq!(
            Expr::parse("`my col` >= 1").expect("parse").columns(),
            ["my col".to_string()].into_iter().collect()
        );
    }
}
