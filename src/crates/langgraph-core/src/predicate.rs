//! A restricted predicate DSL evaluated over state fields.
//!
//! Used by the `Router` node kind to decide routes without resorting to
//! arbitrary expression evaluation (see the design notes on "routing
//! without expression evaluation"). Supports equality, membership, numeric
//! comparison and the logical combinators `and`/`or`/`not` over dotted
//! field paths into the execution state.
//!
//! Grammar (informal):
//!
//! ```text
//! expr       := or_expr
//! or_expr    := and_expr ( "or" and_expr )*
//! and_expr   := unary ( "and" unary )*
//! unary      := "not" unary | comparison | "(" expr ")"
//! comparison := field op literal
//! op         := "==" | "!=" | ">" | ">=" | "<" | "<=" | "in"
//! literal    := string | number | "true" | "false" | "[" literal ("," literal)* "]"
//! ```

use serde_json::Value;
use std::fmt;

/// An error parsing a condition string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateParseError(pub String);

impl fmt::Display for PredicateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "predicate parse error: {}", self.0)
    }
}

impl std::error::Error for PredicateParseError {}

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
    List(Vec<Literal>),
}

/// A parsed predicate, ready to evaluate repeatedly against different states.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Comparison {
        field: String,
        op: Op,
        literal: Literal,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn parse(source: &str) -> Result<Self, PredicateParseError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(PredicateParseError(format!(
                "unexpected trailing tokens near {:?}",
                &parser.tokens[parser.pos..]
            )));
        }
        Ok(expr)
    }

    /// Evaluate against a state object, resolving each field as a dotted
    /// path (`a.b.c`) into the JSON value.
    pub fn evaluate(&self, state: &Value) -> bool {
        match self {
            Predicate::And(a, b) => a.evaluate(state) && b.evaluate(state),
            Predicate::Or(a, b) => a.evaluate(state) || b.evaluate(state),
            Predicate::Not(inner) => !inner.evaluate(state),
            Predicate::Comparison { field, op, literal } => {
                let value = resolve_field(state, field);
                evaluate_comparison(value, op, literal)
            }
        }
    }
}

fn resolve_field<'a>(state: &'a Value, field: &str) -> Option<&'a Value> {
    let mut current = state;
    for segment in field.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn literal_to_value(literal: &Literal) -> Value {
    match literal {
        Literal::Str(s) => Value::String(s.clone()),
        Literal::Num(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::List(items) => Value::Array(items.iter().map(literal_to_value).collect()),
    }
}

fn evaluate_comparison(value: Option<&Value>, op: &Op, literal: &Literal) -> bool {
    match op {
        Op::In => {
            let Literal::List(items) = literal else {
                return false;
            };
            match value {
                Some(v) => items.iter().any(|item| values_equal(v, &literal_to_value(item))),
                None => false,
            }
        }
        Op::Eq => value
            .map(|v| values_equal(v, &literal_to_value(literal)))
            .unwrap_or(false),
        Op::Ne => !value
            .map(|v| values_equal(v, &literal_to_value(literal)))
            .unwrap_or(false),
        Op::Gt | Op::Ge | Op::Lt | Op::Le => {
            let (Some(v), Literal::Num(n)) = (value, literal) else {
                return false;
            };
            let Some(v_num) = v.as_f64() else {
                return false;
            };
            match op {
                Op::Gt => v_num > *n,
                Op::Ge => v_num >= *n,
                Op::Lt => v_num < *n,
                Op::Le => v_num <= *n,
                _ => unreachable!(),
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    And,
    Or,
    Not,
    True,
    False,
    Op(Op),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(source: &str) -> Result<Vec<Token>, PredicateParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(PredicateParseError("unterminated string literal".to_string()));
                }
                tokens.push(Token::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(Op::Eq));
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(Op::Ne));
                i += 2;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(Op::Ge));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(Op::Gt));
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(Op::Le));
                i += 2;
            }
            '<' => {
                tokens.push(Token::Op(Op::Lt));
                i += 1;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num = text
                    .parse::<f64>()
                    .map_err(|_| PredicateParseError(format!("invalid number '{text}'")))?;
                tokens.push(Token::Num(num));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::Op(Op::In),
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(PredicateParseError(format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn parse_or(&mut self) -> Result<Predicate, PredicateParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.parse_and()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate, PredicateParseError> {
        let mut left = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let right = self.parse_unary()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Predicate, PredicateParseError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        if matches!(self.peek(), Some(Token::LParen)) {
            self.advance();
            let inner = self.parse_or()?;
            match self.advance() {
                Some(Token::RParen) => return Ok(inner),
                _ => return Err(PredicateParseError("expected closing ')'".to_string())),
            }
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Predicate, PredicateParseError> {
        let field = match self.advance() {
            Some(Token::Ident(name)) => name,
            other => {
                return Err(PredicateParseError(format!(
                    "expected a field name, found {other:?}"
                )))
            }
        };
        let op = match self.advance() {
            Some(Token::Op(op)) => op,
            other => return Err(PredicateParseError(format!("expected an operator, found {other:?}"))),
        };
        let literal = self.parse_literal()?;
        Ok(Predicate::Comparison { field, op, literal })
    }

    fn parse_literal(&mut self) -> Result<Literal, PredicateParseError> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Literal::Str(s)),
            Some(Token::Num(n)) => Ok(Literal::Num(n)),
            Some(Token::True) => Ok(Literal::Bool(true)),
            Some(Token::False) => Ok(Literal::Bool(false)),
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if !matches!(self.peek(), Some(Token::RBracket)) {
                    loop {
                        items.push(self.parse_literal()?);
                        if matches!(self.peek(), Some(Token::Comma)) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                match self.advance() {
                    Some(Token::RBracket) => Ok(Literal::List(items)),
                    other => Err(PredicateParseError(format!(
                        "expected closing ']', found {other:?}"
                    ))),
                }
            }
            other => Err(PredicateParseError(format!("expected a literal, found {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_over_string_field() {
        let pred = Predicate::parse("intent == 'refund'").unwrap();
        assert!(pred.evaluate(&json!({"intent": "refund"})));
        assert!(!pred.evaluate(&json!({"intent": "greeting"})));
    }

    #[test]
    fn numeric_comparison() {
        let pred = Predicate::parse("intentConfidence >= 0.8").unwrap();
        assert!(pred.evaluate(&json!({"intentConfidence": 0.9})));
        assert!(!pred.evaluate(&json!({"intentConfidence": 0.5})));
    }

    #[test]
    fn membership() {
        let pred = Predicate::parse("intent in ['refund', 'cancel']").unwrap();
        assert!(pred.evaluate(&json!({"intent": "cancel"})));
        assert!(!pred.evaluate(&json!({"intent": "greeting"})));
    }

    #[test]
    fn logical_combinators() {
        let pred = Predicate::parse("intent == 'refund' and intentConfidence >= 0.5").unwrap();
        assert!(pred.evaluate(&json!({"intent": "refund", "intentConfidence": 0.6})));
        assert!(!pred.evaluate(&json!({"intent": "refund", "intentConfidence": 0.2})));

        let pred = Predicate::parse("not (intent == 'refund')").unwrap();
        assert!(pred.evaluate(&json!({"intent": "greeting"})));
        assert!(!pred.evaluate(&json!({"intent": "refund"})));
    }

    #[test]
    fn dotted_field_path() {
        let pred = Predicate::parse("currentNodeConfig.tone == 'formal'").unwrap();
        assert!(pred.evaluate(&json!({"currentNodeConfig": {"tone": "formal"}})));
    }

    #[test]
    fn missing_field_is_falsy() {
        let pred = Predicate::parse("missingField == 'x'").unwrap();
        assert!(!pred.evaluate(&json!({})));
    }
}
