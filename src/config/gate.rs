// src/config/gate.rs

//! Gate expressions of config-declared flows.
//!
//! ```text
//! expr := term ('&' term)*
//! term := '~' term | '(' expr ')' | name ('.' name)*
//! name := [A-Za-z0-9_]+
//! ```
//!
//! A reference names a task added by an earlier step of the same flow. A
//! dotted reference reaches into a nested flow (`"inner.leaf"`).

use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, TaskFlowError};
use crate::precondition::Precondition;
use crate::scope::FlowScope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateExpr {
    Ref(String),
    Not(Box<GateExpr>),
    And(Box<GateExpr>, Box<GateExpr>),
}

impl GateExpr {
    pub fn parse(src: &str) -> Result<Self> {
        let mut parser = Parser {
            src,
            chars: src.chars().collect(),
            pos: 0,
        };
        let expr = parser.expr()?;
        parser.skip_ws();
        if let Some(c) = parser.peek() {
            return Err(parser.error(&format!("unexpected '{c}'")));
        }
        Ok(expr)
    }

    /// Every task reference, in source order.
    pub fn refs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            GateExpr::Ref(name) => out.push(name),
            GateExpr::Not(inner) => inner.collect_refs(out),
            GateExpr::And(lhs, rhs) => {
                lhs.collect_refs(out);
                rhs.collect_refs(out);
            }
        }
    }

    /// Compile against the flow being evaluated. References resolve through
    /// [`FlowScope::precondition_for`], so a reference to a gated task
    /// carries that task's own precondition.
    pub fn to_precondition(&self, scope: &dyn FlowScope) -> Precondition {
        match self {
            GateExpr::Ref(name) => scope.precondition_for(name),
            GateExpr::Not(inner) => !inner.to_precondition(scope),
            GateExpr::And(lhs, rhs) => lhs.to_precondition(scope) & rhs.to_precondition(scope),
        }
    }
}

impl FromStr for GateExpr {
    type Err = TaskFlowError;

    fn from_str(s: &str) -> Result<Self> {
        GateExpr::parse(s)
    }
}

impl fmt::Display for GateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateExpr::Ref(name) => write!(f, "{name}"),
            GateExpr::Not(inner) => write!(f, "~{inner}"),
            GateExpr::And(lhs, rhs) => write!(f, "({lhs} & {rhs})"),
        }
    }
}

struct Parser<'s> {
    src: &'s str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn expr(&mut self) -> Result<GateExpr> {
        let mut lhs = self.term()?;
        loop {
            self.skip_ws();
            if self.peek() != Some('&') {
                return Ok(lhs);
            }
            self.pos += 1;
            let rhs = self.term()?;
            lhs = GateExpr::And(Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<GateExpr> {
        self.skip_ws();
        match self.peek() {
            Some('~') => {
                self.pos += 1;
                Ok(GateExpr::Not(Box::new(self.term()?)))
            }
            Some('(') => {
                self.pos += 1;
                let inner = self.expr()?;
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err(self.error("expected ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(c) if is_name_char(c) => self.reference(),
            Some(c) => Err(self.error(&format!("unexpected '{c}'"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn reference(&mut self) -> Result<GateExpr> {
        let mut out = self.name()?;
        while self.peek() == Some('.') {
            self.pos += 1;
            out.push('.');
            out.push_str(&self.name()?);
        }
        Ok(GateExpr::Ref(out))
    }

    fn name(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a task name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, msg: &str) -> TaskFlowError {
        TaskFlowError::GateParse(format!("{msg} at position {} in '{}'", self.pos, self.src))
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

