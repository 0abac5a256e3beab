use std::cmp::Ordering;

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while parsing query options. A syntactically invalid
/// clause fails the whole request; it is never silently ignored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("malformed query: {0}")]
    Malformed(String),
}

impl QueryError {
    pub fn malformed(message: impl Into<String>) -> Self {
        QueryError::Malformed(message.into())
    }
}

/// Boolean filter expression over entity fields, parsed from the
/// `$filter` query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
    Compare(Operand, CompareOp, Operand),
    /// String predicates: contains / startswith / endswith.
    StringTest(StringTest, Operand, Operand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringTest {
    Contains,
    StartsWith,
    EndsWith,
}

/// A comparison operand: a field reference, a literal, or a string
/// function applied to another operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Literal(Value),
    ToLower(Box<Operand>),
    ToUpper(Box<Operand>),
    Length(Box<Operand>),
}

impl FilterExpr {
    /// Evaluate against a single record's field map. Type mismatches make
    /// the predicate false rather than failing the request; only syntax
    /// errors are client errors.
    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        match self {
            FilterExpr::And(left, right) => left.matches(record) && right.matches(record),
            FilterExpr::Or(left, right) => left.matches(record) || right.matches(record),
            FilterExpr::Not(inner) => !inner.matches(record),
            FilterExpr::Compare(left, op, right) => {
                let lhs = left.resolve(record);
                let rhs = right.resolve(record);
                match op {
                    CompareOp::Eq => values_equal(&lhs, &rhs),
                    CompareOp::Ne => !values_equal(&lhs, &rhs),
                    CompareOp::Gt => matches!(compare_values(&lhs, &rhs), Some(Ordering::Greater)),
                    CompareOp::Ge => matches!(
                        compare_values(&lhs, &rhs),
                        Some(Ordering::Greater) | Some(Ordering::Equal)
                    ),
                    CompareOp::Lt => matches!(compare_values(&lhs, &rhs), Some(Ordering::Less)),
                    CompareOp::Le => matches!(
                        compare_values(&lhs, &rhs),
                        Some(Ordering::Less) | Some(Ordering::Equal)
                    ),
                }
            }
            FilterExpr::StringTest(test, target, needle) => {
                match (target.resolve(record), needle.resolve(record)) {
                    (Value::String(target), Value::String(needle)) => match test {
                        StringTest::Contains => target.contains(&needle),
                        StringTest::StartsWith => target.starts_with(&needle),
                        StringTest::EndsWith => target.ends_with(&needle),
                    },
                    _ => false,
                }
            }
        }
    }
}

impl Operand {
    fn resolve(&self, record: &Map<String, Value>) -> Value {
        match self {
            Operand::Field(name) => record.get(name).cloned().unwrap_or(Value::Null),
            Operand::Literal(value) => value.clone(),
            Operand::ToLower(inner) => match inner.resolve(record) {
                Value::String(s) => Value::String(s.to_lowercase()),
                _ => Value::Null,
            },
            Operand::ToUpper(inner) => match inner.resolve(record) {
                Value::String(s) => Value::String(s.to_uppercase()),
                _ => Value::Null,
            },
            Operand::Length(inner) => match inner.resolve(record) {
                Value::String(s) => Value::from(s.chars().count() as u64),
                _ => Value::Null,
            },
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        // Numbers compare numerically so 500 and 500.0 are equal
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        _ => left == right,
    }
}

/// Ordering comparison. Numbers compare numerically, strings try a numeric
/// parse first and fall back to lexicographic order; other combinations
/// are unordered.
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => match (l.parse::<f64>(), r.parse::<f64>()) {
            (Ok(lf), Ok(rf)) => lf.partial_cmp(&rf),
            _ => Some(l.cmp(r)),
        },
        (Value::Number(l), Value::String(r)) => l.as_f64()?.partial_cmp(&r.parse::<f64>().ok()?),
        (Value::String(l), Value::Number(r)) => l.parse::<f64>().ok()?.partial_cmp(&r.as_f64()?),
        _ => None,
    }
}

/// Parse a `$filter` expression such as
/// `Price gt 500 and (contains(Name,'top') or CategoryId eq 2)`.
pub fn parse_filter(input: &str) -> Result<FilterExpr, QueryError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(QueryError::malformed(format!(
            "unexpected trailing input in filter: {:?}",
            parser.tokens[parser.pos]
        )));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
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
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        // '' inside a literal is an escaped quote
                        Some('\'') => {
                            if chars.peek() == Some(&'\'') {
                                chars.next();
                                text.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some(ch) => text.push(ch),
                        None => {
                            return Err(QueryError::malformed("unterminated string literal"));
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut text = String::new();
                if c == '-' {
                    text.push(c);
                    chars.next();
                }
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number: f64 = text
                    .parse()
                    .map_err(|_| QueryError::malformed(format!("invalid number literal '{}'", text)))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(text));
            }
            other => {
                return Err(QueryError::malformed(format!(
                    "unexpected character '{}' in filter",
                    other
                )));
            }
        }
    }

    Ok(tokens)
}

/// Recursive-descent parser. Precedence, loosest first: or, and, not,
/// comparison.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let Some(Token::Ident(word)) = self.peek() {
            if word == keyword {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn expect_rparen(&mut self) -> Result<(), QueryError> {
        match self.next() {
            Some(Token::RParen) => Ok(()),
            other => Err(QueryError::malformed(format!(
                "expected ')' in filter, found {:?}",
                other
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<FilterExpr, QueryError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FilterExpr, QueryError> {
        let mut left = self.parse_unary()?;
        while self.eat_keyword("and") {
            let right = self.parse_unary()?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<FilterExpr, QueryError> {
        if self.eat_keyword("not") {
            let inner = self.parse_unary()?;
            return Ok(FilterExpr::Not(Box::new(inner)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            self.expect_rparen()?;
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<FilterExpr, QueryError> {
        if let Some(test) = self.peek_string_test() {
            self.pos += 2; // function name + '('
            let target = self.parse_operand()?;
            match self.next() {
                Some(Token::Comma) => {}
                other => {
                    return Err(QueryError::malformed(format!(
                        "expected ',' in filter function, found {:?}",
                        other
                    )));
                }
            }
            let needle = self.parse_operand()?;
            self.expect_rparen()?;
            return Ok(FilterExpr::StringTest(test, target, needle));
        }

        let left = self.parse_operand()?;
        let op = match self.next() {
            Some(Token::Ident(word)) => match word.as_str() {
                "eq" => CompareOp::Eq,
                "ne" => CompareOp::Ne,
                "gt" => CompareOp::Gt,
                "ge" => CompareOp::Ge,
                "lt" => CompareOp::Lt,
                "le" => CompareOp::Le,
                other => {
                    return Err(QueryError::malformed(format!(
                        "unknown comparison operator '{}'",
                        other
                    )));
                }
            },
            other => {
                return Err(QueryError::malformed(format!(
                    "expected comparison operator, found {:?}",
                    other
                )));
            }
        };
        let right = self.parse_operand()?;
        Ok(FilterExpr::Compare(left, op, right))
    }

    fn peek_string_test(&self) -> Option<StringTest> {
        if self.tokens.get(self.pos + 1) != Some(&Token::LParen) {
            return None;
        }
        match self.peek() {
            Some(Token::Ident(word)) => match word.as_str() {
                "contains" => Some(StringTest::Contains),
                "startswith" => Some(StringTest::StartsWith),
                "endswith" => Some(StringTest::EndsWith),
                _ => None,
            },
            _ => None,
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, QueryError> {
        match self.next() {
            Some(Token::Number(n)) => {
                let number = serde_json::Number::from_f64(n)
                    .ok_or_else(|| QueryError::malformed("non-finite number literal"))?;
                Ok(Operand::Literal(Value::Number(number)))
            }
            Some(Token::Str(s)) => Ok(Operand::Literal(Value::String(s))),
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Ok(Operand::Literal(Value::Bool(true))),
                "false" => Ok(Operand::Literal(Value::Bool(false))),
                "null" => Ok(Operand::Literal(Value::Null)),
                "tolower" | "toupper" | "length" if self.peek() == Some(&Token::LParen) => {
                    self.pos += 1;
                    let inner = Box::new(self.parse_operand()?);
                    self.expect_rparen()?;
                    Ok(match word.as_str() {
                        "tolower" => Operand::ToLower(inner),
                        "toupper" => Operand::ToUpper(inner),
                        _ => Operand::Length(inner),
                    })
                }
                _ => Ok(Operand::Field(word)),
            },
            other => Err(QueryError::malformed(format!(
                "expected operand in filter, found {:?}",
                other
            ))),
        }
    }
}
