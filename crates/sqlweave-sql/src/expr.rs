//! The small expression grammar used by `<if test>`, `<when test>`,
//! `<bind value>`, and `<foreach collection>`.
//!
//! Supported: property access (dotted, indexed), comparisons (`==`, `!=`,
//! `<`, `<=`, `>`, `>=`), boolean connectives (`and`, `or`, `not`),
//! string/number/boolean/null literals, and parentheses.

use crate::scope::Scope;
use sqlweave_core::{Error, Result, Value};

use std::cmp::Ordering;

/// A compiled test expression.
#[derive(Debug, Clone)]
pub struct TestExpr {
    src: String,
    ast: Ast,
}

#[derive(Debug, Clone)]
enum Ast {
    Literal(Value),
    Path(String),
    Not(Box<Ast>),
    And(Box<Ast>, Box<Ast>),
    Or(Box<Ast>, Box<Ast>),
    Cmp(Box<Ast>, CmpOp, Box<Ast>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl TestExpr {
    pub fn parse(src: &str) -> Result<Self> {
        let tokens = lex(src)?;
        let mut parser = Parser {
            src,
            tokens,
            pos: 0,
        };
        let ast = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("trailing input"));
        }
        Ok(Self {
            src: src.to_string(),
            ast,
        })
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    /// Evaluates against the scope, producing a value.
    pub fn eval(&self, scope: &Scope<'_>) -> Result<Value> {
        self.ast.eval(scope)
    }

    /// Evaluates against the scope and reduces to truthiness.
    pub fn eval_bool(&self, scope: &Scope<'_>) -> Result<bool> {
        Ok(truthy(&self.ast.eval(scope)?))
    }
}

/// Truthiness: null is false, booleans are themselves, numbers compare
/// against zero, everything else (including the empty string) is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(v) => *v,
        _ => match value.as_f64() {
            Some(n) => n != 0.0,
            None => true,
        },
    }
}

impl Ast {
    fn eval(&self, scope: &Scope<'_>) -> Result<Value> {
        Ok(match self {
            Ast::Literal(value) => value.clone(),
            Ast::Path(path) => scope.resolve(path)?,
            Ast::Not(inner) => Value::Bool(!truthy(&inner.eval(scope)?)),
            Ast::And(lhs, rhs) => {
                Value::Bool(truthy(&lhs.eval(scope)?) && truthy(&rhs.eval(scope)?))
            }
            Ast::Or(lhs, rhs) => {
                Value::Bool(truthy(&lhs.eval(scope)?) || truthy(&rhs.eval(scope)?))
            }
            Ast::Cmp(lhs, op, rhs) => {
                let lhs = lhs.eval(scope)?;
                let rhs = rhs.eval(scope)?;
                Value::Bool(compare(&lhs, *op, &rhs))
            }
        })
    }
}

fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
    let eq = || {
        if lhs.is_null() || rhs.is_null() {
            lhs.is_null() && rhs.is_null()
        } else {
            lhs == rhs || lhs.partial_cmp(rhs) == Some(Ordering::Equal)
        }
    };
    match op {
        CmpOp::Eq => eq(),
        CmpOp::Ne => !eq(),
        CmpOp::Lt => lhs.partial_cmp(rhs) == Some(Ordering::Less),
        CmpOp::Le => matches!(
            lhs.partial_cmp(rhs),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CmpOp::Gt => lhs.partial_cmp(rhs) == Some(Ordering::Greater),
        CmpOp::Ge => matches!(
            lhs.partial_cmp(rhs),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Path(String),
    Str(String),
    Num(Value),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, msg: &str) -> Error {
        Error::config(format!("invalid test expression `{}`: {msg}", self.src))
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Ast> {
        let mut lhs = self.and()?;
        while self.eat(&Tok::Or) {
            let rhs = self.and()?;
            lhs = Ast::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Ast> {
        let mut lhs = self.unary()?;
        while self.eat(&Tok::And) {
            let rhs = self.unary()?;
            lhs = Ast::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Ast> {
        if self.eat(&Tok::Not) {
            return Ok(Ast::Not(Box::new(self.unary()?)));
        }
        self.cmp()
    }

    fn cmp(&mut self) -> Result<Ast> {
        let lhs = self.operand()?;
        let op = match self.peek() {
            Some(Tok::EqEq) => CmpOp::Eq,
            Some(Tok::Ne) => CmpOp::Ne,
            Some(Tok::Lt) => CmpOp::Lt,
            Some(Tok::Le) => CmpOp::Le,
            Some(Tok::Gt) => CmpOp::Gt,
            Some(Tok::Ge) => CmpOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.operand()?;
        Ok(Ast::Cmp(Box::new(lhs), op, Box::new(rhs)))
    }

    fn operand(&mut self) -> Result<Ast> {
        if self.eat(&Tok::LParen) {
            let inner = self.expr()?;
            if !self.eat(&Tok::RParen) {
                return Err(self.error("expected `)`"));
            }
            return Ok(inner);
        }
        let tok = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(match tok {
            Tok::Path(path) => Ast::Path(path),
            Tok::Str(value) => Ast::Literal(Value::String(value)),
            Tok::Num(value) => Ast::Literal(value),
            Tok::True => Ast::Literal(Value::Bool(true)),
            Tok::False => Ast::Literal(Value::Bool(false)),
            Tok::Null => Ast::Literal(Value::Null),
            other => return Err(self.error(&format!("unexpected token {other:?}"))),
        })
    }
}

fn lex(src: &str) -> Result<Vec<Tok>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    let err = |msg: &str| Error::config(format!("invalid test expression `{src}`: {msg}"));

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Tok::EqEq);
                    i += 2;
                } else {
                    return Err(err("single `=` is not an operator"));
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Tok::Ne);
                    i += 2;
                } else {
                    return Err(err("expected `!=`"));
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Tok::Le);
                    i += 2;
                } else {
                    tokens.push(Tok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Tok::Ge);
                    i += 2;
                } else {
                    tokens.push(Tok::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] as char != quote {
                    j += 1;
                }
                if j == bytes.len() {
                    return Err(err("unterminated string literal"));
                }
                tokens.push(Tok::Str(src[start..j].to_string()));
                i = j + 1;
            }
            '-' | '0'..='9' => {
                let start = i;
                i += 1;
                let mut is_float = false;
                while i < bytes.len() {
                    match bytes[i] as char {
                        '0'..='9' => i += 1,
                        '.' if !is_float
                            && matches!(bytes.get(i + 1), Some(b'0'..=b'9')) =>
                        {
                            is_float = true;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                let text = &src[start..i];
                let value = if is_float {
                    Value::F64(text.parse().map_err(|_| err("invalid number"))?)
                } else {
                    Value::I64(text.parse().map_err(|_| err("invalid number"))?)
                };
                tokens.push(Tok::Num(value));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                i = lex_path(bytes, i, src)?;
                let text = &src[start..i];
                tokens.push(match text {
                    "and" => Tok::And,
                    "or" => Tok::Or,
                    "not" => Tok::Not,
                    "true" => Tok::True,
                    "false" => Tok::False,
                    "null" => Tok::Null,
                    path => Tok::Path(path.to_string()),
                });
            }
            other => return Err(err(&format!("unexpected character `{other}`"))),
        }
    }

    Ok(tokens)
}

/// Consumes an identifier followed by `.ident` and `[index]` chunks.
fn lex_path(bytes: &[u8], mut i: usize, src: &str) -> Result<usize> {
    let ident = |bytes: &[u8], mut i: usize| {
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
            i += 1;
        }
        i
    };

    i = ident(bytes, i);
    loop {
        match bytes.get(i) {
            Some(b'.') if matches!(bytes.get(i + 1), Some(c) if c.is_ascii_alphabetic() || *c == b'_') =>
            {
                i = ident(bytes, i + 1);
            }
            Some(b'[') => {
                let close = bytes[i..]
                    .iter()
                    .position(|&b| b == b']')
                    .ok_or_else(|| {
                        Error::config(format!(
                            "invalid test expression `{src}`: unclosed `[`"
                        ))
                    })?;
                i += close + 1;
            }
            _ => return Ok(i),
        }
    }
}
