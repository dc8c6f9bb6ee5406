//! Math tool — evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `%`, `^` (right-associative power),
//! parentheses, and unary negation. Uses a recursive-descent parser for
//! correctness. No dependencies beyond std.

use async_trait::async_trait;
use std::collections::BTreeMap;

use cogwork_core::context::ExecContext;
use cogwork_core::error::ToolError;
use cogwork_core::tool::{ParamSpec, ParamType, Tool, ToolOutput};

pub struct MathTool;

#[async_trait]
impl Tool for MathTool {
    fn name(&self) -> &str {
        "math"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression. Supports +, -, *, /, %, ^, parentheses, and decimal numbers."
    }

    fn parameters(&self) -> BTreeMap<String, ParamSpec> {
        BTreeMap::from([
            (
                "operation".to_string(),
                ParamSpec::required(
                    ParamType::String,
                    "What to do with the expression: 'evaluate' computes it, 'check' only validates the syntax",
                ),
            ),
            (
                "expression".to_string(),
                ParamSpec::required(
                    ParamType::String,
                    "The expression, e.g. '(2 + 3) * 4'",
                ),
            ),
        ])
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ExecContext,
    ) -> Result<ToolOutput, ToolError> {
        let operation = arguments["operation"].as_str().ok_or_else(|| {
            ToolError::InvalidArguments {
                tool_name: "math".into(),
                reason: "missing 'operation' argument".into(),
            }
        })?;
        let expression = arguments["expression"].as_str().ok_or_else(|| {
            ToolError::InvalidArguments {
                tool_name: "math".into(),
                reason: "missing 'expression' argument".into(),
            }
        })?;

        tracing::debug!(operation, expression, "math tool invoked");
        match operation {
            "evaluate" => match evaluate(expression) {
                Ok(value) => Ok(ToolOutput::ok(format_value(value))
                    .with_data(serde_json::json!({"result": value}))),
                Err(e) => Ok(ToolOutput::fail(format!("Error: {e}"))),
            },
            "check" => match evaluate(expression) {
                Ok(_) => Ok(ToolOutput::ok("valid")),
                Err(e) => Ok(ToolOutput::fail(format!("invalid: {e}"))),
            },
            other => Err(ToolError::InvalidArguments {
                tool_name: "math".into(),
                reason: format!("unknown operation '{other}', expected 'evaluate' or 'check'"),
            }),
        }
    }
}

/// Format a result nicely: no trailing .0 for integers.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Recursive-descent expression evaluator ────────────────────────────────

/// Evaluate an arithmetic expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = scan(expr)?;
    let mut parser = ExprParser::new(&tokens);
    let result = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(format!(
            "unexpected token at position {}: {:?}",
            parser.pos, parser.tokens[parser.pos]
        ));
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Open,
    Close,
}

fn scan(input: &str) -> Result<Vec<Tok>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Tok::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Tok::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Tok::Percent);
                i += 1;
            }
            '^' => {
                tokens.push(Tok::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Tok::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::Close);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num: f64 = text.parse().map_err(|_| format!("invalid number: {text}"))?;
                tokens.push(Tok::Num(num));
            }
            c => return Err(format!("unexpected character: '{c}'")),
        }
    }

    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: &'a [Tok],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn new(tokens: &'a [Tok]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Tok> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr = term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut left = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Tok::Plus => {
                    self.bump();
                    left += self.term()?;
                }
                Tok::Minus => {
                    self.bump();
                    left -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = power (('*' | '/' | '%') power)*
    fn term(&mut self) -> Result<f64, String> {
        let mut left = self.power()?;
        while let Some(op) = self.peek() {
            match op {
                Tok::Star => {
                    self.bump();
                    left *= self.power()?;
                }
                Tok::Slash => {
                    self.bump();
                    let right = self.power()?;
                    if right == 0.0 {
                        return Err("division by zero".into());
                    }
                    left /= right;
                }
                Tok::Percent => {
                    self.bump();
                    let right = self.power()?;
                    if right == 0.0 {
                        return Err("modulo by zero".into());
                    }
                    left %= right;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // power = unary ('^' power)?   (right-associative)
    fn power(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if let Some(Tok::Caret) = self.peek() {
            self.bump();
            let exponent = self.power()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // unary = '-' unary | primary
    fn unary(&mut self) -> Result<f64, String> {
        if let Some(Tok::Minus) = self.peek() {
            self.bump();
            let val = self.unary()?;
            return Ok(-val);
        }
        self.primary()
    }

    // primary = NUMBER | '(' expr ')'
    fn primary(&mut self) -> Result<f64, String> {
        match self.bump() {
            Some(Tok::Num(n)) => Ok(*n),
            Some(Tok::Open) => {
                let val = self.expr()?;
                match self.bump() {
                    Some(Tok::Close) => Ok(val),
                    _ => Err("expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("unexpected token: {tok:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
