//! Recursive-descent parser for pointcut expressions.
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | "(" expr ")" | primary
//! primary := designator "(" body ")" | reference "()"
//! ```
//!
//! Designator bodies are handed to the pattern parsers verbatim, so nested
//! parentheses such as `execution(* *(..))` are balanced here and nowhere
//! else.
use std::fmt;

use crate::{
    core::pointcut::pattern::{ExecutionPattern, ParamPattern, TypePattern},
    utils::wildcard::Wildcard,
};

/// Parsed pointcut expression.
#[derive(Debug, Clone)]
pub enum PointcutExpr {
    Execution(ExecutionPattern),
    Within(TypePattern),
    Bean(Wildcard),
    Args(ParamPattern),
    AtAnnotation(String),
    AtTarget(String),
    AtWithin(String),
    This(String),
    Target(String),
    /// `name()` pointing at a pointcut defined elsewhere
    Reference(String),
    And(Box<PointcutExpr>, Box<PointcutExpr>),
    Or(Box<PointcutExpr>, Box<PointcutExpr>),
    Not(Box<PointcutExpr>),
}

impl PointcutExpr {
    /// Whether evaluation needs runtime values (arguments or receiver).
    pub fn is_dynamic(&self) -> bool {
        match self {
            PointcutExpr::Args(_)
            | PointcutExpr::AtTarget(_)
            | PointcutExpr::This(_)
            | PointcutExpr::Target(_) => true,
            PointcutExpr::And(a, b) | PointcutExpr::Or(a, b) => a.is_dynamic() || b.is_dynamic(),
            PointcutExpr::Not(inner) => inner.is_dynamic(),
            _ => false,
        }
    }

    /// Names of every `name()` reference in the tree.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            PointcutExpr::Reference(name) => out.push(name),
            PointcutExpr::And(a, b) | PointcutExpr::Or(a, b) => {
                a.collect_references(out);
                b.collect_references(out);
            }
            PointcutExpr::Not(inner) => inner.collect_references(out),
            _ => {}
        }
    }
}

impl fmt::Display for PointcutExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointcutExpr::Execution(p) => write!(f, "execution({p})"),
            PointcutExpr::Within(p) => write!(f, "within({p})"),
            PointcutExpr::Bean(p) => write!(f, "bean({p})"),
            PointcutExpr::Args(p) => write!(f, "args{p}"),
            PointcutExpr::AtAnnotation(a) => write!(f, "@annotation({a})"),
            PointcutExpr::AtTarget(a) => write!(f, "@target({a})"),
            PointcutExpr::AtWithin(a) => write!(f, "@within({a})"),
            PointcutExpr::This(t) => write!(f, "this({t})"),
            PointcutExpr::Target(t) => write!(f, "target({t})"),
            PointcutExpr::Reference(name) => write!(f, "{name}()"),
            PointcutExpr::And(a, b) => write!(f, "({a} && {b})"),
            PointcutExpr::Or(a, b) => write!(f, "({a} || {b})"),
            PointcutExpr::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

/// Where and why parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

pub fn parse(text: &str) -> Result<PointcutExpr, ParseError> {
    let mut parser = Parser { text, pos: 0 };
    let expr = parser.parse_or()?;
    parser.skip_ws();
    if parser.pos < text.len() {
        return Err(ParseError::new(parser.pos, "unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<PointcutExpr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat("||") {
            let right = self.parse_and()?;
            left = PointcutExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<PointcutExpr, ParseError> {
        let mut left = self.parse_unary()?;
        while self.eat("&&") {
            let right = self.parse_unary()?;
            left = PointcutExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<PointcutExpr, ParseError> {
        if self.eat("!") {
            return Ok(PointcutExpr::Not(Box::new(self.parse_unary()?)));
        }
        if self.eat("(") {
            let inner = self.parse_or()?;
            if !self.eat(")") {
                return Err(ParseError::new(self.pos, "expected ')'"));
            }
            return Ok(inner);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<PointcutExpr, ParseError> {
        self.skip_ws();
        let start = self.pos;
        let ident_len = self
            .rest()
            .char_indices()
            .find(|(i, c)| !(c.is_alphanumeric() || matches!(c, '_' | '$' | '.') || (*i == 0 && *c == '@')))
            .map(|(i, _)| i)
            .unwrap_or(self.rest().len());
        if ident_len == 0 {
            return Err(ParseError::new(start, "expected a pointcut designator"));
        }
        let ident = &self.rest()[..ident_len];
        self.pos += ident_len;

        if !self.eat("(") {
            return Err(ParseError::new(self.pos, format!("expected '(' after '{ident}'")));
        }
        let body_start = self.pos;
        let body = self.balanced_body()?;

        let at_body = |r: Result<PointcutExpr, String>| {
            r.map_err(|message| ParseError::new(body_start, message))
        };
        let single_name = |body: &str| {
            let name = body.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                Err(format!("expected a single type name, got '{name}'"))
            } else {
                Ok(name.to_string())
            }
        };

        match ident {
            "execution" => at_body(ExecutionPattern::parse(body).map(PointcutExpr::Execution)),
            "within" => at_body(TypePattern::parse(body).map(PointcutExpr::Within)),
            "bean" => at_body(Wildcard::bean(body.trim()).map(PointcutExpr::Bean)),
            "args" => at_body(ParamPattern::parse(body).map(PointcutExpr::Args)),
            "@annotation" => at_body(single_name(body).map(PointcutExpr::AtAnnotation)),
            "@target" => at_body(single_name(body).map(PointcutExpr::AtTarget)),
            "@within" => at_body(single_name(body).map(PointcutExpr::AtWithin)),
            "this" => at_body(single_name(body).map(PointcutExpr::This)),
            "target" => at_body(single_name(body).map(PointcutExpr::Target)),
            other if other.starts_with('@') => Err(ParseError::new(
                start,
                format!("unknown designator '{other}'"),
            )),
            other if body.trim().is_empty() => {
                let name = other.rsplit('.').next().unwrap_or(other);
                Ok(PointcutExpr::Reference(name.to_string()))
            }
            other => Err(ParseError::new(
                start,
                format!("unknown designator '{other}'"),
            )),
        }
    }

    /// Consume up to the `)` that closes an already-consumed `(`.
    fn balanced_body(&mut self) -> Result<&'a str, ParseError> {
        let start = self.pos;
        let mut depth = 1usize;
        for (i, c) in self.rest().char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let body = &self.text[start..start + i];
                        self.pos = start + i + 1;
                        return Ok(body);
                    }
                }
                _ => {}
            }
        }
        Err(ParseError::new(start, "unbalanced parentheses"))
    }
}
